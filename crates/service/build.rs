use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto = PathBuf::from("proto/powershelf/v1/powershelf.proto");
    let proto_dir = PathBuf::from("proto");
    let include = protoc_bin_vendored::include_path()?;

    let mut config = prost_build::Config::new();
    config.protoc_executable(protoc_bin_vendored::protoc_bin_path()?);

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_with_config(config, &[&proto], &[&proto_dir, &include])?;

    println!("cargo:rerun-if-changed={}", proto.display());
    Ok(())
}
