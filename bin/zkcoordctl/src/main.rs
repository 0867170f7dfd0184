use std::process::exit;

use zkcoord_util_failure::format_fail;
use zkcoordctl::run;

fn main() {
    if let Err(error) = run() {
        let message = format_fail(&error);
        eprintln!("{}", message);
        exit(1);
    }
}
