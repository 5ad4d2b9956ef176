// main.rs
//
// Supervisor (C9): the daemon's entry point. Loads configuration, verifies Redis is reachable
// (a hard failure), probes the schedule store (a soft failure, per
// `startup_without_database_connections`), performs one synchronous refill so the time index
// is warm before anything else starts, then spawns the Refill, Consumer, Dispatch, and Control
// Listener loops each on their own thread and waits for them for the life of the process.

mod logging;

use std::env;
use std::process::exit;
use std::thread;

use scheduler_core::channel::make_channel;
use scheduler_core::queue::JobQueue;
use scheduler_core::store;
use scheduler_core::{config::AppConfig, consumer, control, dispatch, refill};
use tracing::{error, info, warn};

fn main() {
	let config_file_path = env::args().nth(1);
	let config = match AppConfig::new_from_toml_file(config_file_path.as_deref()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("Fatal: could not load configuration: {}", e);
			exit(1);
		}
	};

	logging::init_tracing(&config);
	info!("Starting scheduler daemon, version {}.", scheduler_core::get_package_version());
	info!("{}", config);

	let queue = match JobQueue::new(&config) {
		Ok(queue) => queue,
		Err(e) => {
			error!("Fatal: could not construct Redis client: {}", e);
			exit(1);
		}
	};
	if let Err(e) = queue.ping() {
		error!("Fatal: Redis is unreachable at startup: {}", e);
		exit(1);
	}
	info!("Redis connection verified.");

	let store = match store::build_store(&config) {
		Ok(store) => store,
		Err(e) if config.startup_without_database_connections => {
			warn!("Schedule store unavailable at startup ({}), but startup_without_database_connections is set; retrying once.", e);
			match store::build_store(&config) {
				Ok(store) => store,
				Err(e) => {
					error!("Fatal: schedule store remained unavailable on retry: {}", e);
					exit(1);
				}
			}
		}
		Err(e) => {
			error!("Fatal: could not connect to the schedule store: {}", e);
			exit(1);
		}
	};
	store::probe(store.as_ref());

	let (sender, receiver) = make_channel();

	info!("Performing initial synchronous refill before starting background loops.");
	refill::refill_once(store.as_ref(), &sender);

	if config.unix_socket_enabled() {
		if let Err(e) = control::spawn_unix_listener(&config) {
			error!("Fatal: could not start Unix domain socket listener: {}", e);
			exit(1);
		}
	} else {
		info!("Unix domain socket listener disabled by configuration.");
	}

	if config.tcp_socket_enabled() {
		if let Err(e) = control::spawn_tcp_listener(&config, queue.clone(), sender.clone()) {
			error!("Fatal: could not start TCP control listener: {}", e);
			exit(1);
		}
	} else {
		info!("TCP control listener disabled by configuration.");
	}

	let refill_config = config.clone();
	let refill_store = store;
	let refill_sender = sender.clone();
	let refill_handle = thread::spawn(move || {
		refill::run(&refill_config, refill_store.as_ref(), &refill_sender);
	});

	// The consumer loop needs its own store handle; schedule stores hold live connections
	// that are not `Sync`-shared across threads, so each loop that needs one builds its own.
	let consumer_config = config.clone();
	let consumer_queue = queue.clone();
	let consumer_handle = thread::spawn(move || {
		let consumer_store = match store::build_store(&consumer_config) {
			Ok(store) => store,
			Err(e) => {
				error!("Fatal: consumer loop could not connect to the schedule store: {}", e);
				exit(1);
			}
		};
		consumer::run(receiver, consumer_store.as_ref(), &consumer_queue);
	});

	let dispatch_config = config.clone();
	let dispatch_queue = queue;
	let dispatch_sender = sender;
	let dispatch_handle = thread::spawn(move || {
		let dispatch_store = match store::build_store(&dispatch_config) {
			Ok(store) => store,
			Err(e) => {
				error!("Fatal: dispatch loop could not connect to the schedule store: {}", e);
				exit(1);
			}
		};
		dispatch::run(&dispatch_config, dispatch_store.as_ref(), &dispatch_queue, &dispatch_sender);
	});

	for handle in [refill_handle, consumer_handle, dispatch_handle] {
		if handle.join().is_err() {
			error!("A background loop panicked; shutting down.");
			exit(1);
		}
	}
}
