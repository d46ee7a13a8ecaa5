/// Prints the driver status and exits with its status code.
pub fn execute() {
    let (status, version) = vdd_windows::backend::query_status();

    println!("Status:  {status}");
    if status.is_ok() {
        println!("Version: {version}");
    }
    println!("{}", status.hint());

    std::process::exit(status.code());
}
