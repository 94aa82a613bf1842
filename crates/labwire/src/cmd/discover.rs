use labwire_client::scan_for;

use crate::cmd::{parse_duration, DiscoverArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_descriptor, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let budget = parse_duration(&args.timeout)?;
    let descriptor = scan_for(&args.server_type, args.announce_port, budget)
        .map_err(|err| client_error("discovery failed", err))?;

    print_descriptor(&descriptor, format);
    Ok(SUCCESS)
}
