use anyhow::Result;
use clap::{Parser, Subcommand};
use serlink::csma::shared_rng;
use serlink::terminal::{SerialTerminal, SerialTerminalConfig, TerminalEvent};
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_serial::DataBits;

#[derive(Parser, Debug)]
#[clap(name = "serlink", version = "0.1.0", author = "Serlink")]
#[clap(about = "A command line interface for the serlink data-link terminal", long_about = None)]
struct SerlinkCli {
    #[clap(subcommand)]
    subcmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a terminal on a serial port and exchange framed messages with the
    /// paired station. Each stdin line is transmitted as one packet.
    Open {
        /// The serial port to open, e.g. /dev/ttys002.
        #[arg(required = true)]
        port: String,
        /// The number of data bits per character.
        #[clap(short, long, default_value = "8")]
        data_bits: u8,
        /// Disable the CSMA/CD medium emulation.
        #[clap(long, default_value = "false")]
        no_emulation: bool,
        /// Disable demonstration bit corruption on the transmit path.
        #[clap(long, default_value = "false")]
        no_corruption: bool,
    },
}

#[derive(Error, Debug)]
enum SerlinkError {
    #[error("Invalid number of data bits (expected 5..=8, found `{0}`)")]
    InvalidDataBits(u8),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = SerlinkCli::parse();
    match cli.subcmd {
        Commands::Open {
            port,
            data_bits,
            no_emulation,
            no_corruption,
        } => {
            let data_bits = match data_bits {
                5 => DataBits::Five,
                6 => DataBits::Six,
                7 => DataBits::Seven,
                8 => DataBits::Eight,
                bits => return Err(SerlinkError::InvalidDataBits(bits).into()),
            };

            let mut config = SerialTerminalConfig::new(port);
            config.data_bits = data_bits;
            config.corruption_enabled = !no_corruption;

            // One random engine for the whole process; the CSMA emulation and
            // the corruption injector draw from it.
            let rng = shared_rng();

            let mut terminal = SerialTerminal::new(config, rng, |event: TerminalEvent| match event {
                TerminalEvent::Message(message) => println!("{}", message),
                TerminalEvent::PacketInfo(info) => println!("{}", info),
                TerminalEvent::Status(status) => eprintln!("{}", status),
                TerminalEvent::Collision => eprintln!("Collision detected, jam signal sent"),
                TerminalEvent::ChannelBusy => eprintln!("Channel busy, waiting"),
                TerminalEvent::ChannelState(state) => eprintln!("Channel state: {}", state),
            });
            if no_emulation {
                terminal.csma().set_emulation_enabled(false);
            }
            terminal.open().await?;

            let mut lines = BufReader::new(io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = terminal.send_message(&line).await {
                    eprintln!("Transmission failed: {}", err);
                }
            }

            terminal.close().await?;
            eprintln!("{}", terminal.csma().statistics());
        }
    }
    Ok(())
}
