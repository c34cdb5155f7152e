// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Output of encoded commands and decoded migration data.

use anyhow::Context as _;
use nvme_lm::AdminCommand;
use nvme_lm::ControllerState;
use nvme_lm::NvmeControllerState;
use nvme_lm::Transfer;
use nvme_spec::lm::CdqFeatureData;
use nvme_spec::lm::ControllerStateHeader;
use nvme_spec::lm::IoCompletionQueueState;
use nvme_spec::lm::IoSubmissionQueueState;
use nvme_spec::lm::LbaMigrationQueueEntry;
use serde_json::json;
use serde_json::Value;
use std::fmt::Display;
use std::io::Write;
use zerocopy::IntoBytes;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Normal,
    Json,
    /// Raw bytes, unchanged.
    Binary,
}

/// How to print, passed to every printer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    pub format: OutputFormat,
    /// Annotate packed fields bit by bit.
    pub verbose: bool,
}

fn field(out: &mut dyn Write, label: &str, value: impl Display) -> std::io::Result<()> {
    writeln!(out, "{label:<45}: {value}")
}

fn hex(value: impl Into<u64>) -> String {
    format!("{:#x}", value.into())
}

fn not(set: bool) -> &'static str {
    if set {
        ""
    } else {
        "NOT "
    }
}

/// JSON numbers are only exact up to 64 bits.
fn json_u128(value: u128) -> Value {
    match u64::try_from(value) {
        Ok(v) => Value::from(v),
        Err(_) => Value::String(value.to_string()),
    }
}

fn print_json(out: &mut dyn Write, value: &Value) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

impl Printer {
    pub fn command(&self, out: &mut dyn Write, name: &str, cmd: &AdminCommand) -> anyhow::Result<()> {
        let c = &cmd.command;
        let (direction, data_len) = match cmd.transfer {
            Transfer::None => ("none", 0),
            Transfer::HostToController(len) => ("host to controller", len),
            Transfer::ControllerToHost(len) => ("controller to host", len),
        };
        match self.format {
            OutputFormat::Binary => out.write_all(c.as_bytes())?,
            OutputFormat::Json => print_json(
                out,
                &json!({
                    "command": name,
                    "opcode": cmd.opcode().0,
                    "cdw10": c.cdw10,
                    "cdw11": c.cdw11,
                    "cdw12": c.cdw12,
                    "cdw13": c.cdw13,
                    "cdw14": c.cdw14,
                    "cdw15": c.cdw15,
                    "data length": data_len,
                    "data direction": direction,
                }),
            )?,
            OutputFormat::Normal => {
                writeln!(out, "{name}:")?;
                field(out, "Opcode", format!("{:#04x}", cmd.opcode().0))?;
                for (label, dw) in [
                    ("CDW10", c.cdw10),
                    ("CDW11", c.cdw11),
                    ("CDW12", c.cdw12),
                    ("CDW13", c.cdw13),
                    ("CDW14", c.cdw14),
                    ("CDW15", c.cdw15),
                ] {
                    field(out, label, format!("{dw:#010x}"))?;
                }
                field(out, "Data Length", data_len)?;
                field(out, "Data Direction", direction)?;
            }
        }
        Ok(())
    }

    /// Prints controller state read from byte `offset` of the structure.
    ///
    /// Only binary output is possible for a read that did not start at the
    /// beginning of the structure.
    pub fn controller_state(
        &self,
        out: &mut dyn Write,
        data: &[u8],
        offset: u64,
    ) -> anyhow::Result<()> {
        if self.format == OutputFormat::Binary {
            out.write_all(data)?;
            return Ok(());
        }
        let state = ControllerState::parse_at(data, offset)
            .context("cannot decode controller state")?;
        for msg in state.truncated.messages() {
            tracing::warn!("{msg}");
        }
        match self.format {
            OutputFormat::Json => print_json(out, &state_json(&state))?,
            _ => self.state_text(out, &state)?,
        }
        Ok(())
    }

    fn state_text(&self, out: &mut dyn Write, state: &ControllerState) -> std::io::Result<()> {
        let Some(header) = &state.header else {
            return Ok(());
        };
        self.header_text(out, header)?;
        let Some(nvme) = &state.nvme else {
            return Ok(());
        };

        writeln!(out, "\nNVMe Controller State Data Structure:")?;
        field(out, "Version (VER)", hex(nvme.header.ver.get()))?;
        field(
            out,
            "Number of I/O Submission Queues (NIOSQ)",
            nvme.header.niosq.get(),
        )?;
        field(
            out,
            "Number of I/O Completion Queues (NIOCQ)",
            nvme.header.niocq.get(),
        )?;
        for (i, sq) in nvme.submission_queues.iter().enumerate() {
            writeln!(out, "\nNVMe I/O Submission Queue Data [{i}]:")?;
            self.sq_text(out, sq)?;
        }
        for (i, cq) in nvme.completion_queues.iter().enumerate() {
            writeln!(out, "\nNVMe I/O Completion Queue Data [{i}]:")?;
            self.cq_text(out, cq)?;
        }
        Ok(())
    }

    fn header_text(&self, out: &mut dyn Write, header: &ControllerStateHeader) -> std::io::Result<()> {
        writeln!(out, "Header:")?;
        field(out, "Version (VER)", hex(header.ver.get()))?;
        field(
            out,
            "Controller State Attributes (CSATTR)",
            hex(header.csattr),
        )?;
        if self.verbose {
            let suspended = header.attributes().suspended();
            writeln!(
                out,
                "  [0:0] : {:#x} Controller {}Suspended",
                suspended as u8,
                not(suspended)
            )?;
        }
        field(
            out,
            "NVMe Controller State Size (NVMECSS)",
            header.nvmecss.get(),
        )?;
        field(out, "Vendor Specific Size (VSS)", header.vss.get())
    }

    fn sq_text(&self, out: &mut dyn Write, sq: &IoSubmissionQueueState) -> std::io::Result<()> {
        field(out, "PRP Entry 1 (IOSQPRP1)", hex(sq.prp1.get()))?;
        field(out, "Queue Size (IOSQQSIZE)", hex(sq.qsize.get()))?;
        field(out, "Identifier (IOSQQID)", hex(sq.qid.get()))?;
        field(
            out,
            "Completion Queue Identifier (IOSQCQID)",
            hex(sq.cqid.get()),
        )?;
        field(out, "Attributes (IOSQA)", hex(sq.attrs.get()))?;
        if self.verbose {
            let attrs = sq.attributes();
            writeln!(
                out,
                "  [2:1] : {:#x} Queue Priority (IOSQQPRIO)",
                attrs.qprio()
            )?;
            writeln!(
                out,
                "  [0:0] : {:#x} Queue {}Physically Contiguous (IOSQPC)",
                attrs.pc() as u8,
                not(attrs.pc())
            )?;
        }
        field(
            out,
            "I/O Submission Queue Head Pointer (IOSQHP)",
            hex(sq.hp.get()),
        )?;
        field(
            out,
            "I/O Submission Queue Tail Pointer (IOSQTP)",
            hex(sq.tp.get()),
        )
    }

    fn cq_text(&self, out: &mut dyn Write, cq: &IoCompletionQueueState) -> std::io::Result<()> {
        field(
            out,
            "I/O Completion PRP Entry 1 (IOCQPRP1)",
            hex(cq.prp1.get()),
        )?;
        field(
            out,
            "I/O Completion Queue Size (IOCQQSIZE)",
            hex(cq.qsize.get()),
        )?;
        field(
            out,
            "I/O Completion Queue Identifier (IOCQQID)",
            hex(cq.qid.get()),
        )?;
        field(
            out,
            "I/O Completion Queue Head Pointer (IOCQHP)",
            hex(cq.hp.get()),
        )?;
        field(
            out,
            "I/O Completion Queue Tail Pointer (IOCQTP)",
            hex(cq.tp.get()),
        )?;
        field(
            out,
            "I/O Completion Queue Attributes (IOCQA)",
            hex(cq.attrs.get()),
        )?;
        if self.verbose {
            let attrs = cq.attributes();
            writeln!(
                out,
                "  [31:16] : {:#x} I/O Completion Queue Interrupt Vector (IOCQIV)",
                attrs.iv()
            )?;
            writeln!(out, "  [2:2] : {:#x} Slot 0 Phase Tag", attrs.phase() as u8)?;
            writeln!(
                out,
                "  [1:1] : {:#x} Interrupts {}Enabled (IOCQIEN)",
                attrs.ien() as u8,
                not(attrs.ien())
            )?;
            writeln!(
                out,
                "  [0:0] : {:#x} Queue {}Physically Contiguous (IOCQPC)",
                attrs.pc() as u8,
                not(attrs.pc())
            )?;
        }
        Ok(())
    }

    pub fn cdq_feature(&self, out: &mut dyn Write, data: &CdqFeatureData) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Binary => out.write_all(data.as_bytes())?,
            OutputFormat::Json => print_json(
                out,
                &json!({
                    "head_pointer": data.hp.get(),
                    "tail_pointer_trigger": data.tpt.get(),
                }),
            )?,
            OutputFormat::Normal => {
                writeln!(out, "Head Pointer: {:#x}", data.hp.get())?;
                writeln!(out, "Tail Pointer Trigger: {:#x}", data.tpt.get())?;
            }
        }
        Ok(())
    }

    pub fn cdq_entries(
        &self,
        out: &mut dyn Write,
        entries: &[LbaMigrationQueueEntry],
    ) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Binary => out.write_all(entries.as_bytes())?,
            OutputFormat::Json => {
                let list = entries
                    .iter()
                    .map(|entry| {
                        let attrs = entry.attributes();
                        json!({
                            "namespace identifier": entry.nsid.get(),
                            "number of logical blocks": entry.nlb.get(),
                            "starting lba": entry.slba.get(),
                            "phase tag": attrs.cdqp(),
                            "entry sequence attribute": attrs.esa(),
                            "deallocated lbas": attrs.dlba(),
                            "lba change information": attrs.lbacir(),
                        })
                    })
                    .collect();
                print_json(out, &Value::Array(list))?;
            }
            OutputFormat::Normal => {
                for (i, entry) in entries.iter().enumerate() {
                    if i != 0 {
                        writeln!(out)?;
                    }
                    writeln!(out, "LBA Migration Queue Entry [{i}]:")?;
                    field(out, "Namespace Identifier (NSID)", hex(entry.nsid.get()))?;
                    field(out, "Number of Logical Blocks (NLB)", hex(entry.nlb.get()))?;
                    field(out, "Starting LBA (SLBA)", hex(entry.slba.get()))?;
                    field(out, "Attributes", hex(entry.attributes))?;
                    if self.verbose {
                        let attrs = entry.attributes();
                        writeln!(
                            out,
                            "  [7:6] : {:#x} LBA Change Information (LBACIR)",
                            attrs.lbacir()
                        )?;
                        writeln!(
                            out,
                            "  [5:5] : {:#x} LBAs {}Deallocated (DLBA)",
                            attrs.dlba() as u8,
                            not(attrs.dlba())
                        )?;
                        writeln!(
                            out,
                            "  [3:1] : {:#x} Entry Sequence Attribute (ESA)",
                            attrs.esa()
                        )?;
                        writeln!(out, "  [0:0] : {:#x} Phase Tag (CDQP)", attrs.cdqp() as u8)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn state_json(state: &ControllerState) -> Value {
    let mut root = serde_json::Map::new();
    if let Some(header) = &state.header {
        root.insert("version".into(), header.ver.get().into());
        root.insert("controller state attributes".into(), header.csattr.into());
        root.insert(
            "nvme controller state size".into(),
            json_u128(header.nvmecss.get()),
        );
        root.insert("vendor specific size".into(), json_u128(header.vss.get()));
    }
    if let Some(nvme) = &state.nvme {
        root.insert("nvme controller state".into(), nvme_json(nvme));
    }
    Value::Object(root)
}

fn nvme_json(nvme: &NvmeControllerState) -> Value {
    let sqs: Vec<Value> = nvme
        .submission_queues
        .iter()
        .map(|sq| {
            json!({
                "io submission prp entry 1": sq.prp1.get(),
                "io submission queue size": sq.qsize.get(),
                "io submission queue identifier": sq.qid.get(),
                "io completion queue identifier": sq.cqid.get(),
                "io submission queue attributes": sq.attrs.get(),
                "io submission queue head pointer": sq.hp.get(),
                "io submission queue tail pointer": sq.tp.get(),
            })
        })
        .collect();
    let cqs: Vec<Value> = nvme
        .completion_queues
        .iter()
        .map(|cq| {
            json!({
                "io completion prp entry 1": cq.prp1.get(),
                "io completion queue size": cq.qsize.get(),
                "io completion queue identifier": cq.qid.get(),
                "io completion queue head pointer": cq.hp.get(),
                "io completion queue tail pointer": cq.tp.get(),
                "io completion queue attributes": cq.attrs.get(),
            })
        })
        .collect();
    json!({
        "version": nvme.header.ver.get(),
        "number of io submission queues": nvme.header.niosq.get(),
        "number of io completion queues": nvme.header.niocq.get(),
        "io submission queue list": sqs,
        "io completion queue list": cqs,
    })
}
