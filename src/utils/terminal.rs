//! Terminal echo control for password entry

use std::io::{self, BufRead, Write};
use termios::{tcsetattr, Termios, ECHO, TCSANOW};

/// RAII guard that disables echo on stdin
/// Restores the previous settings on drop
pub struct EchoGuard {
	fd: i32,
	original: Termios,
}

impl EchoGuard {
	/// Returns None if stdin is not a terminal
	pub fn new() -> Option<Self> {
		let fd = 0; // stdin
		let original = Termios::from_fd(fd).ok()?;
		let mut silent = original;
		silent.c_lflag &= !ECHO;
		if tcsetattr(fd, TCSANOW, &silent).is_err() {
			return None;
		}
		Some(EchoGuard { fd, original })
	}
}

impl Drop for EchoGuard {
	fn drop(&mut self) {
		let _ = tcsetattr(self.fd, TCSANOW, &self.original);
	}
}

/// Print `prompt` and read one line from stdin
pub fn read_line(prompt: &str) -> io::Result<String> {
	let mut stderr = io::stderr();
	write!(stderr, "{}", prompt)?;
	stderr.flush()?;
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line)?;
	Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Like [`read_line`] with echo turned off
pub fn read_password(prompt: &str) -> io::Result<String> {
	let guard = EchoGuard::new();
	let result = read_line(prompt);
	drop(guard);
	// The newline typed by the user was not echoed
	let _ = writeln!(io::stderr());
	result
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_echo_guard_creation() {
		// None when the tests do not run in a terminal
		let _guard = EchoGuard::new();
	}
}

// vim: ts=4
