// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Command line tool for NVMe controller live migration.
//!
//! Builds the live migration admin commands and prints them for submission
//! through an admin passthru facility, and decodes the data those commands
//! return.

mod print;

use anyhow::Context as _;
use clap::Parser;
use nvme_lm::CdqReader;
use nvme_lm::CreateCdq;
use nvme_lm::DeleteCdq;
use nvme_lm::GetCdqFeature;
use nvme_lm::MigrationReceive;
use nvme_lm::MigrationSend;
use nvme_lm::SetCdqFeature;
use nvme_lm::TrackSend;
use nvme_spec::lm::CdqFeatureData;
use nvme_spec::lm::CdqQueueType;
use nvme_spec::lm::MigrationSendSelect;
use nvme_spec::lm::SequenceIndicator;
use nvme_spec::lm::SuspendType;
use nvme_spec::lm::TrackSendMos;
use nvme_spec::lm::TrackSendSelect;
use print::OutputFormat;
use print::Printer;
use std::path::Path;
use std::path::PathBuf;
use zerocopy::FromBytes;

/// Environment variable holding the `tracing` filter.
const LOG_VAR: &str = "NVME_LM_LOG";

/// NVMe controller live migration commands.
#[derive(Parser)]
struct CliArgs {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct OutputArgs {
    #[clap(long, value_enum, default_value_t = OutputFormat::Normal)]
    output_format: OutputFormat,

    /// Decode packed fields bit by bit.
    #[clap(long)]
    human_readable: bool,
}

impl OutputArgs {
    fn printer(&self) -> Printer {
        Printer {
            format: self.output_format,
            verbose: self.human_readable,
        }
    }
}

#[derive(clap::Subcommand)]
enum Command {
    /// Create a controller data queue.
    ///
    /// The queue memory must stay pinned and physically contiguous for the
    /// life of the queue.
    CreateCdq {
        /// Queue size in dwords, a multiple of the queue entry size.
        #[clap(long)]
        size: u32,

        /// Controller whose user data changes are logged.
        #[clap(long, default_value_t = 0)]
        cntlid: u16,

        #[clap(long, default_value_t = 0)]
        queue_type: u8,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Delete a controller data queue.
    DeleteCdq {
        #[clap(long)]
        cdqid: u16,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Manage tracking of information by a controller.
    TrackSend {
        /// 0: Log User Data Changes.
        #[clap(long)]
        select: u8,

        /// Management operation specific value, overridden by --start and
        /// --stop.
        #[clap(long, default_value_t = 0)]
        mos: u16,

        #[clap(long)]
        cdqid: u16,

        /// Start logging.
        #[clap(long)]
        start: bool,

        /// Stop logging.
        #[clap(long)]
        stop: bool,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Suspend or resume a controller, or set its state.
    MigrationSend {
        /// 0: Suspend, 1: Resume, 2: Set Controller State.
        #[clap(long)]
        select: u8,

        #[clap(long, default_value_t = 0)]
        cntlid: u16,

        /// Suspend and resume only.
        #[clap(long, default_value_t = 0)]
        suspend_type: u8,

        /// Delete the user data migration queue. Suspend and resume only.
        #[clap(long)]
        delete: bool,

        /// Sequence indicator, 3 for the entire state in one command.
        #[clap(long, default_value_t = 0)]
        seq_ind: u8,

        /// Controller state UUID index.
        #[clap(long, default_value_t = 0)]
        uuid_index: u8,

        /// Controller state version index.
        #[clap(long, default_value_t = 0)]
        version_index: u8,

        /// Byte offset into the controller state.
        #[clap(long, default_value_t = 0)]
        offset: u64,

        /// Dwords of controller state to send. Defaults to the whole input
        /// file.
        #[clap(long)]
        numd: Option<u32>,

        /// Controller state to set.
        #[clap(long)]
        input_file: Option<PathBuf>,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Read controller state.
    MigrationRecv {
        #[clap(long, default_value_t = 0)]
        cntlid: u16,

        #[clap(long, default_value_t = 0)]
        uuid_index: u8,

        #[clap(long, default_value_t = 0)]
        version_index: u8,

        #[clap(long, default_value_t = 0)]
        offset: u64,

        #[clap(long)]
        numd: u32,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Set the head pointer and tail pointer trigger of a controller data
    /// queue.
    SetCdq {
        #[clap(long)]
        cdqid: u16,

        #[clap(long, default_value_t = 0)]
        hp: u32,

        /// Slot that raises a tail pointer event when written.
        #[clap(long)]
        tpt: Option<u32>,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Read the head pointer and tail pointer trigger of a controller data
    /// queue.
    GetCdq {
        #[clap(long)]
        cdqid: u16,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Decode a Migration Receive data buffer.
    ShowState {
        /// The receive buffer.
        file: PathBuf,

        /// Offset the buffer was read from.
        #[clap(long, default_value_t = 0)]
        offset: u64,

        /// Dwords of state requested, used to size --output-file.
        #[clap(long)]
        numd: Option<u32>,

        /// Write the requested state, without the trailing dword of the
        /// receive buffer, to this file.
        #[clap(long)]
        output_file: Option<PathBuf>,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Decode Get Features data for the controller data queue feature.
    ShowCdqFeature {
        file: PathBuf,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Decode the posted entries of a user data migration queue.
    ShowCdqEntries {
        /// The queue memory.
        file: PathBuf,

        #[clap(flatten)]
        output: OutputArgs,
    },
}

fn main() -> anyhow::Result<()> {
    enable_tracing()?;
    let args = CliArgs::parse();
    let mut out = std::io::stdout().lock();
    match args.command {
        Command::CreateCdq {
            size,
            cntlid,
            queue_type,
            output,
        } => {
            let params = CreateCdq {
                size_dwords: size,
                cntlid,
                queue_type: CdqQueueType(queue_type),
            };
            let cmd = params.command()?;
            output.printer().command(&mut out, "Create CDQ", &cmd)?;
        }
        Command::DeleteCdq { cdqid, output } => {
            let cmd = DeleteCdq { cdqid }.command();
            output.printer().command(&mut out, "Delete CDQ", &cmd)?;
        }
        Command::TrackSend {
            select,
            mos,
            cdqid,
            start,
            stop,
            output,
        } => {
            let params = TrackSend {
                select: TrackSendSelect(select),
                mos: TrackSendMos(mos),
                cdqid,
                start,
                stop,
            };
            let cmd = params.command()?;
            let name = format!("Track Send ({})", params.select.name());
            output.printer().command(&mut out, &name, &cmd)?;
        }
        Command::MigrationSend {
            select,
            cntlid,
            suspend_type,
            delete,
            seq_ind,
            uuid_index,
            version_index,
            offset,
            numd,
            input_file,
            output,
        } => {
            let file = input_file.as_deref().map(read_file).transpose()?;
            let numd = numd.unwrap_or_else(|| {
                file.as_ref().map_or(0, |file| (file.len() / 4) as u32)
            });
            // Only the first numd dwords of the file are sent.
            let data = file
                .as_deref()
                .map(|file| &file[..file.len().min(numd as usize * 4)]);
            let params = MigrationSend {
                select: MigrationSendSelect(select),
                cntlid,
                suspend_type: SuspendType(suspend_type),
                delete,
                sequence: SequenceIndicator(seq_ind),
                uuid_index,
                version_index,
                offset,
                numd,
                data,
            };
            let cmd = params.command()?;
            let name = format!("Migration Send ({})", params.select.name());
            output.printer().command(&mut out, &name, &cmd)?;
        }
        Command::MigrationRecv {
            cntlid,
            uuid_index,
            version_index,
            offset,
            numd,
            output,
        } => {
            let params = MigrationReceive {
                cntlid,
                uuid_index,
                version_index,
                offset,
                numd,
            };
            output
                .printer()
                .command(&mut out, "Migration Receive", &params.command())?;
        }
        Command::SetCdq {
            cdqid,
            hp,
            tpt,
            output,
        } => {
            let cmd = SetCdqFeature { cdqid, hp, tpt }.command();
            output.printer().command(&mut out, "Set CDQ Feature", &cmd)?;
        }
        Command::GetCdq { cdqid, output } => {
            let cmd = GetCdqFeature { cdqid }.command();
            output.printer().command(&mut out, "Get CDQ Feature", &cmd)?;
        }
        Command::ShowState {
            file,
            offset,
            numd,
            output_file,
            output,
        } => {
            let data = read_file(&file)?;
            if let Some(path) = output_file {
                let len = numd.map_or(data.len(), |numd| {
                    (numd as usize * 4).min(data.len())
                });
                std::fs::write(&path, &data[..len])
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            output.printer().controller_state(&mut out, &data, offset)?;
        }
        Command::ShowCdqFeature { file, output } => {
            let data = read_file(&file)?;
            let (feature, _) = CdqFeatureData::read_from_prefix(&data).map_err(|_| {
                anyhow::anyhow!(
                    "{} is {} bytes, feature data is {} bytes",
                    file.display(),
                    data.len(),
                    size_of::<CdqFeatureData>()
                )
            })?;
            output.printer().cdq_feature(&mut out, &feature)?;
        }
        Command::ShowCdqEntries { file, output } => {
            let queue = read_file(&file)?;
            let mut reader = CdqReader::for_size((queue.len() / 4) as u32);
            let entries: Vec<_> = reader.drain(&queue).collect();
            tracing::debug!(count = entries.len(), head = reader.head(), "read cdq entries");
            output.printer().cdq_entries(&mut out, &entries)?;
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Enables tracing output to stderr.
fn enable_tracing() -> anyhow::Result<()> {
    let filter = if let Ok(filter) = std::env::var(LOG_VAR) {
        tracing_subscriber::EnvFilter::try_new(filter).context("invalid NVME_LM_LOG")?
    } else {
        tracing_subscriber::EnvFilter::default()
            .add_directive(tracing::metadata::LevelFilter::INFO.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .log_internal_errors(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e).context("failed to enable tracing"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_migration_send() {
        let args = CliArgs::try_parse_from([
            "nvme_lm_tool",
            "migration-send",
            "--select",
            "2",
            "--seq-ind",
            "3",
            "--input-file",
            "state.bin",
            "--output-format",
            "json",
        ])
        .unwrap();
        let Command::MigrationSend {
            select,
            seq_ind,
            input_file,
            numd,
            output,
            ..
        } = args.command
        else {
            panic!("wrong subcommand");
        };
        assert_eq!(select, 2);
        assert_eq!(seq_ind, 3);
        assert_eq!(input_file.as_deref(), Some(Path::new("state.bin")));
        assert_eq!(numd, None);
        assert_eq!(output.output_format, OutputFormat::Json);
    }

    #[test]
    fn set_cdq_without_tpt() {
        let args = CliArgs::try_parse_from(["nvme_lm_tool", "set-cdq", "--cdqid", "3", "--hp", "8"])
            .unwrap();
        let Command::SetCdq { cdqid, hp, tpt, .. } = args.command else {
            panic!("wrong subcommand");
        };
        assert_eq!((cdqid, hp, tpt), (3, 8, None));
    }
}
