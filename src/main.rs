fn main() {
    if let Err(err) = company_notes::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
