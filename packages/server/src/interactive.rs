//! Interactive mode for the server.
//!
//! Prompts the user for bind address and port before starting the server.

use dialoguer::{Confirm, Input};

/// Runs the server in interactive mode, prompting for configuration.
///
/// Defaults come from `BIND_ADDR` and `PORT`, then the answers are passed
/// to [`super::run_server_on`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Accident Map Server");
    println!();

    let (default_addr, default_port) = super::bind_from_env();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default(default_addr.clone())
        .interact_text()
        .unwrap_or(default_addr);

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(default_port)
        .interact_text()
        .unwrap_or(default_port);

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server_on(&bind_addr, port).await
}
