use labwire_client::DEFAULT_CLOSE_GRACE;

use crate::cmd::{connect, FeaturesArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_features, OutputFormat};

pub fn run(args: FeaturesArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.target)?;
    let features = session
        .list_features()
        .map_err(|err| client_error("feature listing failed", err))?;

    print_features(&features, format);

    let _ = session.close(DEFAULT_CLOSE_GRACE);
    Ok(SUCCESS)
}
