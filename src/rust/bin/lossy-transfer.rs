// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

//==============================================================================
// Imports
//==============================================================================

use ::anyhow::Result;
use ::catstream::{
    inetstack::test_helpers::{
        LinkStats,
        ALICE_IPV4,
        BOB_IPV4,
    },
    runtime::logging,
    Config,
    ConnectionStats,
    Engine,
    LinkConfig,
    QDesc,
    TcpConfig,
    TcpPeer,
};
use ::clap::{
    Arg,
    ArgMatches,
    Command,
};
use ::std::{
    net::SocketAddrV4,
    time::{
        Duration,
        Instant,
    },
};

//==============================================================================
// Program Arguments
//==============================================================================

/// Program Arguments
#[derive(Debug)]
pub struct ProgramArguments {
    /// Number of bytes to transfer.
    size: usize,
    /// Probability that a datagram is lost.
    loss: f64,
    /// One-way latency of the link.
    latency: Duration,
    /// Seed of the link.
    seed: u64,
    /// Optional YAML file with a `tcp` section.
    config: Option<String>,
}

/// Associate functions for Program Arguments
impl ProgramArguments {
    /// Default transfer size (in bytes).
    const DEFAULT_SIZE: usize = 1 << 20;
    /// Default loss rate.
    const DEFAULT_LOSS: f64 = 0.1;
    /// Default one-way latency (in milliseconds).
    const DEFAULT_LATENCY_MS: u64 = 5;
    /// Default seed.
    const DEFAULT_SEED: u64 = 1;

    /// Parses the program arguments from the command line interface.
    pub fn new(app_name: &'static str, app_author: &'static str, app_about: &'static str) -> Result<Self> {
        let matches: ArgMatches = Command::new(app_name)
            .author(app_author)
            .about(app_about)
            .arg(
                Arg::new("size")
                    .long("size")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("BYTES")
                    .help("Sets the number of bytes to transfer"),
            )
            .arg(
                Arg::new("loss")
                    .long("loss")
                    .value_parser(clap::value_parser!(f64))
                    .required(false)
                    .value_name("RATE")
                    .help("Sets the probability that a datagram is lost"),
            )
            .arg(
                Arg::new("latency")
                    .long("latency")
                    .value_parser(clap::value_parser!(u64))
                    .required(false)
                    .value_name("MILLISECONDS")
                    .help("Sets the one-way latency of the link"),
            )
            .arg(
                Arg::new("seed")
                    .long("seed")
                    .value_parser(clap::value_parser!(u64))
                    .required(false)
                    .value_name("NUMBER")
                    .help("Sets the seed of the simulated link"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("PATH")
                    .help("Reads transport parameters from a YAML file"),
            )
            .get_matches();

        let mut args: ProgramArguments = ProgramArguments {
            size: Self::DEFAULT_SIZE,
            loss: Self::DEFAULT_LOSS,
            latency: Duration::from_millis(Self::DEFAULT_LATENCY_MS),
            seed: Self::DEFAULT_SEED,
            config: None,
        };

        if let Some(size) = matches.get_one::<usize>("size") {
            if *size == 0 {
                anyhow::bail!("transfer size must be positive");
            }
            args.size = *size;
        }
        if let Some(loss) = matches.get_one::<f64>("loss") {
            if !(0.0..1.0).contains(loss) {
                anyhow::bail!("loss rate must be in [0, 1)");
            }
            args.loss = *loss;
        }
        if let Some(latency) = matches.get_one::<u64>("latency") {
            if *latency == 0 {
                anyhow::bail!("latency must be positive");
            }
            args.latency = Duration::from_millis(*latency);
        }
        if let Some(seed) = matches.get_one::<u64>("seed") {
            args.seed = *seed;
        }
        if let Some(config) = matches.get_one::<String>("config") {
            args.config = Some(config.clone());
        }

        Ok(args)
    }

    fn tcp_config(&self) -> Result<TcpConfig> {
        match self.config {
            Some(ref path) => Ok(Config::load(path)?.tcp_config()?),
            None => Ok(TcpConfig::default()),
        }
    }
}

//==============================================================================
// Application
//==============================================================================

/// Application
struct Application {
    engine: Engine,
    client: TcpPeer,
    server: TcpPeer,
    client_qd: QDesc,
    server_qd: QDesc,
    size: usize,
}

/// Associated Functions for the Application
impl Application {
    /// Port the server listens on.
    const PORT: u16 = 12345;
    /// Virtual time allowed for the whole transfer.
    const TIMEOUT: Duration = Duration::from_secs(3600);

    /// Sets up both hosts and connects them.
    pub fn new(args: &ProgramArguments) -> Result<Self> {
        let tcp_config: TcpConfig = args.tcp_config()?;
        let link: LinkConfig = LinkConfig::default()
            .set_loss_rate(args.loss)
            .set_latency(args.latency);
        let mut engine: Engine = Engine::new(Instant::now(), link, args.seed);
        let server: TcpPeer = engine.add_peer(BOB_IPV4, tcp_config.clone());
        let client: TcpPeer = engine.add_peer(ALICE_IPV4, tcp_config);

        let listen_qd: QDesc = server.socket()?;
        server.bind(listen_qd, Self::PORT)?;
        server.listen(listen_qd, 1)?;

        let client_qd: QDesc = client.socket()?;
        client.connect(client_qd, SocketAddrV4::new(BOB_IPV4, Self::PORT))?;
        let connected: bool = engine.run_until(Self::TIMEOUT, |_| {
            client.is_connected(client_qd) && server.pending_connections(listen_qd).unwrap_or(0) > 0
        });
        if !connected {
            anyhow::bail!("handshake did not complete");
        }
        let server_qd: QDesc = server.accept(listen_qd)?;
        server.close(listen_qd)?;

        println!("Connected: {:?} -> {:?}", client.endpoints(client_qd)?.0, server.endpoints(server_qd)?.0);
        Ok(Self {
            engine,
            client,
            server,
            client_qd,
            server_qd,
            size: args.size,
        })
    }

    /// Pushes the payload through the connection and reports what it took.
    pub fn run(&mut self) -> Result<()> {
        let data: Vec<u8> = (0..self.size).map(|i| (i % 251) as u8).collect();
        let start: Instant = self.engine.now();
        let mut written: usize = 0;
        let mut received: usize = 0;
        let mut corrupted: bool = false;
        let mut buf: Vec<u8> = vec![0; 64 * 1024];

        let (client, server): (&TcpPeer, &TcpPeer) = (&self.client, &self.server);
        let (client_qd, server_qd): (QDesc, QDesc) = (self.client_qd, self.server_qd);
        let done: bool = self.engine.run_until(Self::TIMEOUT, |_| {
            if written < data.len() {
                written += client.write(client_qd, &data[written..]).unwrap_or(0);
            }
            while let Ok(n) = server.read(server_qd, &mut buf) {
                if n == 0 {
                    break;
                }
                corrupted |= buf[..n] != data[received..received + n];
                received += n;
            }
            corrupted || received == data.len()
        });
        if !done {
            anyhow::bail!("transfer timed out after {} of {} bytes", received, data.len());
        }
        if corrupted {
            anyhow::bail!("received data does not match what was sent");
        }

        let elapsed: Duration = self.engine.now() - start;
        let stats: ConnectionStats = match self.client.stats(self.client_qd)? {
            Some(stats) => stats,
            None => anyhow::bail!("connection went away"),
        };
        let link: LinkStats = self.engine.network().stats();
        println!("{} bytes in {:?} of virtual time", received, elapsed);
        println!(
            "goodput: {:.2} Mbit/s",
            (received as f64 * 8.0) / elapsed.as_secs_f64().max(f64::EPSILON) / 1e6
        );
        println!(
            "retransmissions={} fast_retransmits={} cwnd={:.2} srtt={:?} rto={:?}",
            stats.retransmissions, stats.fast_retransmits, stats.cwnd, stats.srtt, stats.rto
        );
        println!(
            "datagrams: transmitted={} lost={} delivered={}",
            link.transmitted, link.lost, link.delivered
        );

        self.client.close(self.client_qd)?;
        self.engine.run_until(Duration::from_secs(60), |engine| {
            engine.network().in_flight() == 0 && self.server.is_closed(self.server_qd)
        });
        Ok(())
    }
}

//==============================================================================

fn main() -> Result<()> {
    logging::initialize();
    let args: ProgramArguments = ProgramArguments::new(
        "lossy-transfer",
        "Microsoft Corporation",
        "Pushes a byte stream through a simulated lossy link.",
    )?;
    let mut app: Application = Application::new(&args)?;
    app.run()
}
