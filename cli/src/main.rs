//! Binary entrypoint for relpack

fn main() {
    if let Err(err) = relpack_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
