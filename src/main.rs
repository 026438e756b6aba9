fn main() {
    if let Err(err) = aihub::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
