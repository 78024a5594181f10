use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use npiroute_core::{
    MessageContainer, ReroutePolicy, Rerouted, Router, RouterConfig, RouterHandle,
};
use npiroute_frame::MessageClass;
use npiroute_transport::{HostSocket, StreamTransport};

use crate::cmd::ServeArgs;
use crate::exit::{
    config_error, router_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS,
};
use crate::output::{print_summary, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;

    let socket = HostSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    let stream = socket
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let link = stream
        .try_clone()
        .map_err(|err| transport_error("accept failed", err))?;
    let read_half = stream
        .try_clone()
        .map_err(|err| transport_error("accept failed", err))?;

    let (to_stack, from_router) = mpsc::channel::<MessageContainer>();
    let mut router =
        Router::new(config, to_stack).map_err(|err| router_error("router setup failed", err))?;
    let handle = router.handle();

    if args.intercept_log {
        handle.register_inbound_callback(log_inbound, ReroutePolicy::Echo);
    }
    install_ctrlc_handler(handle.clone())?;

    let mut transport = StreamTransport::spawn(read_half, stream, Arc::new(handle.clone()))
        .map_err(|err| transport_error("transport setup failed", err))?;
    let stack = spawn_loopback_stack(handle, from_router)?;

    let result = router.run(&mut transport);

    // The stack thread ends once the router drops its sender.
    drop(router);
    transport.close();
    if let Err(err) = link.shutdown() {
        tracing::debug!(error = %err, "host link shutdown failed");
    }
    if stack.join().is_err() {
        tracing::warn!("loopback stack thread panicked");
    }

    let summary = result.map_err(|err| router_error("router stopped", err))?;
    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn load_config(args: &ServeArgs) -> CliResult<RouterConfig> {
    let mut config = match &args.config {
        Some(path) => RouterConfig::from_json_file(path)
            .map_err(|err| config_error("config load failed", err))?,
        None => RouterConfig::default(),
    };
    if let Some(ms) = args.watchdog_ms {
        config.watchdog_timeout_ms = ms;
    }
    if let Some(capacity) = args.queue_capacity {
        config.queue_capacity = capacity;
    }
    if args.flow_control {
        config.flow_control = true;
    }
    config
        .validate()
        .map_err(|err| config_error("invalid configuration", err))?;
    Ok(config)
}

fn log_inbound(rerouted: Rerouted<'_>) {
    let message = rerouted.message();
    tracing::info!(
        class = %message.class(),
        size = message.len(),
        "host message observed"
    );
}

fn spawn_loopback_stack(
    handle: RouterHandle,
    inbound: mpsc::Receiver<MessageContainer>,
) -> CliResult<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("npi-stack".to_string())
        .spawn(move || {
            for message in inbound.iter() {
                answer(&handle, message);
            }
            tracing::debug!("loopback stack stopped");
        })
        .map_err(|err| CliError::new(INTERNAL, format!("stack thread spawn failed: {err}")))
}

/// Answer a SYNC request with the matching response and echo everything else.
fn answer(handle: &RouterHandle, message: MessageContainer) {
    let class = message.class();
    let transaction = message.transaction();
    let reply = loopback_reply(class, message.into_payload().to_vec());

    let result = match (class, transaction) {
        (MessageClass::SyncRequest, Some(id)) => handle.respond(id, &reply),
        (MessageClass::SyncRequest, None) => {
            tracing::warn!("sync request delivered without a transaction");
            return;
        }
        _ => handle.post_from_stack(reply),
    };
    if let Err(err) = result {
        tracing::warn!(error = %err, %class, "loopback reply dropped");
    }
}

fn loopback_reply(class: MessageClass, mut message: Vec<u8>) -> Vec<u8> {
    if class == MessageClass::SyncRequest {
        if let Some(cmd0) = message.first_mut() {
            *cmd0 = MessageClass::SyncResponse.apply_to(*cmd0);
        }
    }
    message
}

fn install_ctrlc_handler(handle: RouterHandle) -> CliResult<()> {
    ctrlc::set_handler(move || handle.shutdown()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
