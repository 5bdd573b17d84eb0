fn main() {
    if let Err(err) = sales_kpi::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
