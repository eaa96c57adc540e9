fn main() {
    match mdcite_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(4);
        }
    }
}
