fn main() {
    if let Err(err) = reflect_rag::run() {
        eprintln!("[reflect-rag] run failed: {err:?}");
        std::process::exit(1);
    }
}
