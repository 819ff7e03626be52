//! Interactive credential entry

use crate::error::ConnectionError;
use crate::remote::{CredentialProvider, Credentials, RemoteResult};

/// Asks for user name and password on the terminal
///
/// A user name given up front is reused on every attempt; only the password is
/// asked again.
pub struct TerminalCredentials {
	location: String,
	user: Option<String>,
}

impl TerminalCredentials {
	pub fn new(location: String, user: Option<String>) -> Self {
		TerminalCredentials { location, user }
	}
}

fn unavailable(e: std::io::Error) -> ConnectionError {
	ConnectionError::CredentialsUnavailable { message: e.to_string() }
}

#[cfg(unix)]
fn read_password(prompt: &str) -> std::io::Result<String> {
	crate::utils::terminal::read_password(prompt)
}

#[cfg(not(unix))]
fn read_password(prompt: &str) -> std::io::Result<String> {
	read_line(prompt)
}

#[cfg(unix)]
fn read_line(prompt: &str) -> std::io::Result<String> {
	crate::utils::terminal::read_line(prompt)
}

#[cfg(not(unix))]
fn read_line(prompt: &str) -> std::io::Result<String> {
	use std::io::{BufRead, Write};
	eprint!("{}", prompt);
	std::io::stderr().flush()?;
	let mut line = String::new();
	std::io::stdin().lock().read_line(&mut line)?;
	Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

impl CredentialProvider for TerminalCredentials {
	fn credentials(&self, attempt: u32) -> RemoteResult<Credentials> {
		if attempt > 1 {
			eprintln!("Login failed, try again");
		}
		let user = match &self.user {
			Some(user) => user.clone(),
			None => read_line(&format!("User for {}: ", self.location)).map_err(unavailable)?,
		};
		if user.is_empty() {
			return Err(ConnectionError::CredentialsUnavailable { message: "empty user name".to_string() });
		}
		let password = read_password(&format!("Password for {}@{}: ", user, self.location)).map_err(unavailable)?;
		Ok(Credentials { user, password })
	}
}

// vim: ts=4
