//! snmp-agentd: demonstration SNMP agent.
//!
//! Serves a few system objects plus a writable setpoint under an
//! enterprise prefix, and optionally announces itself with a coldStart
//! notification.

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use snmp_engine::{Agent, Binding, Oid, PollStatus, StatusCallback, Trap, TrapDelivery, oid};

/// Run a demonstration SNMP v1/v2c agent.
#[derive(Debug, Parser)]
#[command(name = "snmp-agentd", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(short = 'b', long, default_value = "0.0.0.0:161")]
    bind: SocketAddr,

    /// Read-write community.
    #[arg(long, default_value = "private")]
    community: String,

    /// Read-only community.
    #[arg(long = "ro-community", default_value = "public")]
    ro_community: String,

    /// Enterprise prefix for the demo objects.
    #[arg(long, default_value = "1.3.6.1.4.1.99999")]
    prefix: String,

    /// Send a coldStart notification to this address on startup.
    #[arg(long = "notify", value_name = "IP")]
    notify: Option<IpAddr>,

    /// Send the startup notification as an inform.
    #[arg(long, requires = "notify")]
    inform: bool,

    /// Reject SNMPv1 requests.
    #[arg(long = "no-v1")]
    no_v1: bool,

    /// Enable debug logging (snmp_engine=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Enable trace logging (snmp_engine=trace).
    #[arg(short = 'D', long = "trace")]
    trace: bool,
}

impl Args {
    fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "snmp_engine=trace,snmp_agentd=trace"
        } else if self.debug {
            "snmp_engine=debug,snmp_agentd=debug"
        } else {
            "snmp_engine=info,snmp_agentd=info"
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.init_tracing();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> snmp_engine::Result<()> {
    let mut agent = Agent::builder()
        .bind(args.bind)
        .community(args.community.clone())
        .read_only_community(args.ro_community.clone())
        .oid_prefix(args.prefix.clone())
        .accept_v1(!args.no_v1)
        .build()?;

    let requests = Arc::new(AtomicU32::new(0));
    let setpoint = Arc::new(AtomicI32::new(20));
    let location = Arc::new(Mutex::new(b"unknown".to_vec()));

    agent.add_handler_absolute(
        "1.3.6.1.2.1.1.1.0",
        Binding::ReadOnlyOctetString(
            format!("snmp-agentd {}", env!("CARGO_PKG_VERSION")).into(),
        ),
        false,
    )?;
    let sys_object_id = Oid::parse(&args.prefix)?;
    agent.add_handler_absolute(
        "1.3.6.1.2.1.1.2.0",
        Binding::ObjectIdentifier(sys_object_id),
        false,
    )?;
    agent.add_handler_absolute(
        "1.3.6.1.2.1.1.6.0",
        Binding::OctetString {
            value: location,
            max_len: 64,
        },
        true,
    )?;
    agent.add_counter32_handler(".1.1.0", requests.clone())?;
    let setpoint_handler = agent.add_integer_handler(".1.2.0", setpoint.clone(), 5, 30, true)?;
    agent.sort_handlers();

    tracing::info!(target: "snmp_agentd", local_addrs = ?agent.local_addrs(), handlers = agent.handlers().len(), "listening");

    // Kept alive for the whole run so queued informs are not purged.
    let startup = args.notify.map(|target| {
        // coldStart
        let trap = Trap::v2c(oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1))
            .community(args.ro_community.clone())
            .inform(args.inform)
            .binding(setpoint_handler.clone());
        (trap, target)
    });
    if let Some((trap, target)) = &startup {
        let on_status: StatusCallback = Box::new(|request_id: i32, delivered: bool| {
            tracing::info!(target: "snmp_agentd", request_id, delivered, "startup notification finished");
        });
        agent.send_trap_to(trap, *target, Some(on_status), TrapDelivery::default())?;
    }

    loop {
        let status = agent.poll();
        if status.consumed_packet() {
            requests.fetch_add(1, Ordering::Relaxed);
        }
        if status == PollStatus::SetOccurred {
            tracing::info!(
                target: "snmp_agentd",
                source = ?agent.last_set_source(),
                setpoint = setpoint.load(Ordering::Relaxed),
                "configuration changed"
            );
            agent.take_set_occurred();
        }
        if status == PollStatus::NoPacket {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
    }

    tracing::info!(target: "snmp_agentd", "shutting down");
    agent.stop();
    Ok(())
}
