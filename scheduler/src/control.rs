// control.rs
//
// Control Listener (C8): two independent, synchronous socket listeners.
//
// The Unix domain socket speaks a minimal legacy protocol: read one line, write it straight
// back, close the connection. It is kept only for interface compatibility with clients that
// predate the JSON protocol; it understands no request types and cannot mutate schedules.
//
// The TCP socket speaks the real control protocol: a single JSON object per connection,
// `{"request_type": ..., "request_content": ...}`, answered with a single JSON object,
// `{"status": "ok"|"error", ...}`, after which the connection is closed. Supported
// request_types are "ping", "echo", "create_task_schedule", "cancel_task_schedule", and
// "list_scheduled".

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::errors::ControlProtocolError;
use crate::fik::Fik;
use crate::queue::JobQueue;

#[derive(Deserialize)]
struct ControlRequest {
	request_type: String,
	#[serde(default)]
	request_content: Option<Value>,
}

#[derive(Serialize)]
struct ControlResponse {
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	request_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

impl ControlResponse {
	fn ok(request_type: &str, data: Value) -> Self {
		ControlResponse {
			status: "ok",
			request_type: Some(request_type.to_owned()),
			data: Some(data),
			error: None,
		}
	}

	fn error(message: impl Into<String>) -> Self {
		ControlResponse {
			status: "error",
			request_type: None,
			data: None,
			error: Some(message.into()),
		}
	}
}

impl From<ControlProtocolError> for ControlResponse {
	fn from(e: ControlProtocolError) -> Self {
		ControlResponse::error(e.to_string())
	}
}

/// Starts the Unix domain socket listener on its own thread, if enabled. Any preexisting
/// socket file at `config.socket_path` is removed first, matching the teacher's cleanup of
/// stale sockets left behind by an unclean shutdown.
pub fn spawn_unix_listener(config: &AppConfig) -> Result<(), std::io::Error> {
	let socket_path = Path::new(&config.socket_path);
	if socket_path.exists() {
		std::fs::remove_file(socket_path)?;
	}

	let listener = UnixListener::bind(socket_path)?;
	info!("Control Listener: Unix domain socket listening at '{}'.", config.socket_path);

	thread::spawn(move || {
		for stream in listener.incoming() {
			match stream {
				Ok(stream) => {
					thread::spawn(move || handle_unix_echo(stream));
				}
				Err(e) => warn!("Control Listener: error accepting Unix socket connection: {}", e),
			}
		}
	});

	Ok(())
}

fn handle_unix_echo(stream: UnixStream) {
	let mut reader = BufReader::new(match stream.try_clone() {
		Ok(s) => s,
		Err(e) => {
			error!("Control Listener: could not clone Unix stream: {}", e);
			return;
		}
	});
	let mut writer = stream;

	let mut line = String::new();
	match reader.read_line(&mut line) {
		Ok(0) => debug!("Control Listener (Unix): client closed connection before sending data."),
		Ok(_) => {
			info!("Control Listener (Unix): received '{}'; echoing back.", line.trim_end());
			if let Err(e) = writer.write_all(line.as_bytes()) {
				debug!("Control Listener (Unix): could not echo response: {}", e);
			}
		}
		Err(e) => debug!("Control Listener (Unix): error reading from client: {}", e),
	}
}

/// Starts the TCP JSON control listener on its own thread, if enabled.
pub fn spawn_tcp_listener(config: &AppConfig, queue: JobQueue, outbox: Sender<String>) -> Result<(), std::io::Error> {
	let port = config.tcp_socket_port.expect("tcp_socket_enabled() already guarantees a port is set");
	let listener = TcpListener::bind(("0.0.0.0", port))?;
	info!("Control Listener: TCP socket listening on port {}.", port);

	thread::spawn(move || {
		for stream in listener.incoming() {
			match stream {
				Ok(stream) => {
					let queue = queue.clone();
					let outbox = outbox.clone();
					thread::spawn(move || handle_tcp_request(stream, &queue, &outbox));
				}
				Err(e) => warn!("Control Listener: error accepting TCP connection: {}", e),
			}
		}
	});

	Ok(())
}

fn handle_tcp_request(stream: TcpStream, queue: &JobQueue, outbox: &Sender<String>) {
	let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "unknown".to_owned());
	let mut reader = BufReader::new(match stream.try_clone() {
		Ok(s) => s,
		Err(e) => {
			error!("Control Listener (TCP): could not clone stream for {}: {}", peer, e);
			return;
		}
	});
	let mut writer = stream;

	let mut buffer = [0u8; 4096];
	use std::io::Read;
	let bytes_read = match reader.read(&mut buffer).map_err(ControlProtocolError::Transport) {
		Ok(n) => n,
		Err(e) => {
			debug!("Control Listener (TCP): error reading from {}: {}", peer, e);
			return;
		}
	};

	if bytes_read == 0 {
		info!("Control Listener (TCP): client {} closed connection before sending data.", peer);
		return;
	}

	let response = parse_and_dispatch(&buffer[..bytes_read], queue, outbox).unwrap_or_else(ControlResponse::from);

	send_json_response(&mut writer, &response);
}

fn parse_and_dispatch(buffer: &[u8], queue: &JobQueue, outbox: &Sender<String>) -> Result<ControlResponse, ControlProtocolError> {
	let message_str = std::str::from_utf8(buffer).map_err(|e| ControlProtocolError::MalformedJson(e.to_string()))?;

	let request: ControlRequest =
		serde_json::from_str(message_str.trim()).map_err(|e| ControlProtocolError::MalformedJson(e.to_string()))?;

	dispatch(request, queue, outbox)
}

fn dispatch(request: ControlRequest, queue: &JobQueue, outbox: &Sender<String>) -> Result<ControlResponse, ControlProtocolError> {
	match request.request_type.as_str() {
		"ping" => Ok(ControlResponse::ok("ping", Value::String("pong".to_owned()))),

		"echo" => Ok(ControlResponse::ok("echo", request.request_content.unwrap_or(Value::Null))),

		"create_task_schedule" => {
			let schedule_id = require_schedule_id(&request)?;
			outbox.send(schedule_id.clone()).map_err(|_| {
				ControlProtocolError::Transport(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "internal work channel is closed"))
			})?;
			info!("Control Listener (TCP): enqueued schedule '{}' from create_task_schedule request.", schedule_id);
			Ok(ControlResponse::ok(
				"create_task_schedule",
				Value::String(format!("Schedule {} now being re-processed.", schedule_id)),
			))
		}

		"cancel_task_schedule" => {
			let schedule_id = require_schedule_id(&request)?;
			match queue.index_remove_schedule(&schedule_id) {
				Ok(removed) => Ok(ControlResponse::ok(
					"cancel_task_schedule",
					Value::String(format!("Schedule {} cancellation requested; removed {} pending firing(s).", schedule_id, removed)),
				)),
				Err(e) => {
					error!("Control Listener (TCP): error cancelling schedule '{}': {}", schedule_id, e);
					Ok(ControlResponse::error(format!("Unable to cancel schedule {}.", schedule_id)))
				}
			}
		}

		"list_scheduled" => match queue.index_scan() {
			Ok(fiks) => Ok(ControlResponse::ok("list_scheduled", fiks_to_json(&fiks))),
			Err(e) => {
				error!("Control Listener (TCP): error listing scheduled firings: {}", e);
				Ok(ControlResponse::error("Unable to list scheduled firings."))
			}
		},

		other => Err(ControlProtocolError::UnknownRequestType(other.to_owned())),
	}
}

fn require_schedule_id(request: &ControlRequest) -> Result<String, ControlProtocolError> {
	match &request.request_content {
		None => Err(ControlProtocolError::MissingRequestContent {
			request_type: request.request_type.clone(),
		}),
		Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
		Some(_) => Err(ControlProtocolError::InvalidRequestContent {
			request_type: request.request_type.clone(),
		}),
	}
}

fn fiks_to_json(fiks: &[Fik]) -> Value {
	let entries: Vec<Value> = fiks
		.iter()
		.map(|fik| {
			serde_json::json!({
				"schedule_id": fik.schedule_id(),
				"fires_at_utc": fik.fire_at_utc().map(|dt| dt.to_rfc3339()),
			})
		})
		.collect();
	Value::Array(entries)
}

fn send_json_response(writer: &mut TcpStream, response: &ControlResponse) {
	let mut body = match serde_json::to_string(response) {
		Ok(body) => body,
		Err(e) => {
			error!("Control Listener (TCP): could not serialize response: {}", e);
			return;
		}
	};
	body.push('\n');
	if let Err(e) = writer.write_all(body.as_bytes()) {
		debug!("Control Listener (TCP): could not send response: {}", e);
	}
}
