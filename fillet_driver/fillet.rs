extern crate fillet_driver;

use std::process;

fn main() {
    if let Err(e) = fillet_driver::run(std::env::args().skip(1)) {
        eprintln!("error: {}", e);
        process::exit(e.exit_code());
    }
}
