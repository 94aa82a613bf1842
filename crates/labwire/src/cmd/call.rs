use labwire_client::DEFAULT_CLOSE_GRACE;
use labwire_wire::CommandCall;

use crate::cmd::{connect, parse_duration, parse_param, CallArgs};
use crate::exit::{invoke_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;

    let mut call = CommandCall::new(&args.feature, &args.command);
    for param in &args.params {
        let (name, value) = parse_param(param)?;
        call = call.with_parameter(name, value);
    }

    let mut session = connect(&args.target)?;
    let reply = session
        .invoke_with_timeout(&call, timeout)
        .map_err(|err| invoke_error("invocation failed", err))?;

    print_reply(&reply, format);

    let _ = session.close(DEFAULT_CLOSE_GRACE);
    Ok(SUCCESS)
}
