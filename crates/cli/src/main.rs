//! # rootward
//!
//! One-shot iterative, DNSSEC-validating resolution from the command line.

mod bootstrap;

use clap::Parser;
use hickory_proto::rr::RecordType;
use rootward_application::{QueryControls, ResolverPort, RrCacheOps};
use rootward_domain::RcodeHint;
use rootward_infrastructure::dns::{ResolverEnv, ResolverService};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rootward")]
#[command(version)]
#[command(about = "Iterative DNSSEC-validating DNS resolver")]
struct Cli {
    /// Domain name to resolve
    qname: String,

    /// Record type to query
    #[arg(default_value = "A")]
    qtype: String,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Do not request DNSSEC records for this query
    #[arg(long)]
    no_dnssec: bool,

    /// Set the CD bit: accept answers that fail validation
    #[arg(long)]
    checking_disabled: bool,

    /// Print the cache contents after resolving
    #[arg(long)]
    show_cache: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match bootstrap_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rootward: {e}");
            return ExitCode::FAILURE;
        }
    };

    let qtype = match RecordType::from_str(&cli.qtype.to_uppercase()) {
        Ok(qtype) => qtype,
        Err(_) => {
            eprintln!("rootward: unknown record type {:?}", cli.qtype);
            return ExitCode::FAILURE;
        }
    };

    let env = match ResolverEnv::new(config.resolver.clone()) {
        Ok(env) => Arc::new(env),
        Err(e) => {
            eprintln!("rootward: {e}");
            return ExitCode::FAILURE;
        }
    };
    let resolver = ResolverService::new(env.clone());

    let controls = QueryControls {
        rd: true,
        cd: cli.checking_disabled,
        dnssec_ok: if cli.no_dnssec { Some(false) } else { None },
        udp_size: None,
    };

    let outcome = resolver.resolve(&cli.qname, qtype, &controls).await;

    let code = match outcome {
        Ok(reply) => {
            let msg = &reply.message;
            println!(
                ";; status: {}, transport: {}, AD: {}",
                msg.response_code(),
                reply.transport.as_str(),
                msg.authentic_data()
            );
            for record in msg.answers() {
                println!("{record}");
            }
            for record in msg.name_servers() {
                println!("{record}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let rcode = match e.rcode() {
                RcodeHint::FormErr => "FORMERR",
                RcodeHint::ServFail => "SERVFAIL",
                RcodeHint::NxDomain => "NXDOMAIN",
                RcodeHint::NotImp => "NOTIMP",
                RcodeHint::Refused => "REFUSED",
                RcodeHint::BadVers => "BADVERS",
            };
            eprintln!("rootward: {rcode}: {e}");
            ExitCode::FAILURE
        }
    };

    if cli.show_cache {
        let ops: &dyn RrCacheOps = env.cache.as_ref();
        println!(";; cache: {} entries", ops.size());
        for row in ops.dump() {
            println!(
                ";;   {} {} {} {} expires@{}",
                row.name,
                row.rtype,
                row.ranking.as_str(),
                row.kind,
                row.expiry
            );
        }
    }

    code
}

fn bootstrap_config(cli: &Cli) -> anyhow::Result<rootward_domain::Config> {
    let config = bootstrap::load_config(cli.config.as_deref())?;
    bootstrap::init_logging(&config);
    tracing::info!(
        config_file = cli.config.as_deref().unwrap_or("default"),
        cache_size = config.resolver.cache_size,
        dnssec_ok = config.resolver.dnssec_ok_default,
        disable_v6_ns = config.resolver.disable_v6_ns,
        "Configuration loaded"
    );
    Ok(config)
}
