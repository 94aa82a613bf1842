//! The end-to-end client walkthrough: discover (or dial) the example
//! server, list its features, ask for a greeting, and read the start year.

use labwire_client::DEFAULT_CLOSE_GRACE;
use labwire_server::features::GREETING_PROVIDER;
use labwire_wire::CommandCall;

use crate::cmd::{connect, GreetArgs};
use crate::exit::{client_error, invoke_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_features, OutputFormat};

pub fn run(args: GreetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.target)?;

    println!(
        "connected to {} (uuid {})",
        session.server_info().server_type,
        session.server_info().server_uuid
    );

    let features = session
        .list_features()
        .map_err(|err| client_error("feature listing failed", err))?;
    print_features(&features, format);

    if !features.iter().any(|f| f == GREETING_PROVIDER) {
        return Err(CliError::new(
            FAILURE,
            format!("server does not implement {GREETING_PROVIDER}"),
        ));
    }

    let say_hello =
        CommandCall::new(GREETING_PROVIDER, "SayHello").with_parameter("Name", args.name.clone());
    let reply = session
        .invoke(&say_hello)
        .map_err(|err| invoke_error("SayHello failed", err))?;
    match reply.string_value("Greeting") {
        Some(greeting) => println!("{greeting}"),
        None => return Err(CliError::new(FAILURE, "reply carried no Greeting")),
    }

    let start_year = session
        .invoke(&CommandCall::new(GREETING_PROVIDER, "StartYear"))
        .map_err(|err| invoke_error("StartYear failed", err))?;
    match start_year.value("StartYear") {
        Some(year) => println!("server start year: {year}"),
        None => return Err(CliError::new(FAILURE, "reply carried no StartYear")),
    }

    session
        .close(DEFAULT_CLOSE_GRACE)
        .map_err(|err| client_error("close failed", err))?;
    Ok(SUCCESS)
}
