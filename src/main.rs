fn main() {
    if let Err(err) = parkzone_lib::run() {
        log::error!("parkzone exited with error: {err:#}");
        eprintln!("parkzone: {err:#}");
        std::process::exit(1);
    }
}
