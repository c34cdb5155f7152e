// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::AdminIssuer;
use crate::CreateCdq;
use crate::LiveMigration;
use crate::MigrationReceive;
use crate::MigrationSend;
use crate::OperationError;
use crate::Payload;
use crate::RequestError;
use crate::SetCdqFeature;
use crate::TrackSend;
use crate::ValidationError;
use nvme_spec as spec;
use nvme_spec::lm;
use nvme_spec::lm::SuspendType;
use nvme_spec::lm::TrackSendMos;
use parking_lot::Mutex;
use std::collections::VecDeque;
use test_with_tracing::test;
use zerocopy::FromZeros;
use zerocopy::IntoBytes;
use zerocopy::U128;
use zerocopy::U16;
use zerocopy::U32;
use zerocopy::U64;

/// What the fake controller does with the next command.
enum Reply {
    Success { dw0: u32, data: Vec<u8> },
    Status(spec::Status),
    Gone,
}

fn ok(dw0: u32) -> Reply {
    Reply::Success {
        dw0,
        data: Vec::new(),
    }
}

/// Records every submitted command and answers from a script.
#[derive(Default)]
struct FakeController {
    inner: Mutex<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    replies: VecDeque<Reply>,
    commands: Vec<spec::Command>,
    received: Vec<Vec<u8>>,
}

impl FakeController {
    fn script(replies: impl IntoIterator<Item = Reply>) -> Self {
        let this = Self::default();
        this.inner.lock().replies.extend(replies);
        this
    }

    fn commands(&self) -> Vec<spec::Command> {
        self.inner.lock().commands.clone()
    }

    fn opcodes(&self) -> Vec<spec::AdminOpcode> {
        self.commands()
            .iter()
            .map(|c| spec::AdminOpcode(c.cdw0.opcode()))
            .collect()
    }
}

impl AdminIssuer for FakeController {
    fn submit(
        &self,
        command: &spec::Command,
        payload: Payload<'_>,
    ) -> Result<spec::Completion, std::io::Error> {
        let mut inner = self.inner.lock();
        inner.commands.push(*command);
        let reply = inner.replies.pop_front().unwrap_or_else(|| ok(0));
        let mut completion = spec::Completion::new_zeroed();
        match reply {
            Reply::Success { dw0, data } => {
                completion.dw0 = dw0;
                match payload {
                    Payload::None => {}
                    Payload::In(buf) => inner.received.push(buf.to_vec()),
                    Payload::Out(buf) => {
                        let len = data.len().min(buf.len());
                        buf[..len].copy_from_slice(&data[..len]);
                    }
                }
            }
            Reply::Status(status) => {
                completion.status = spec::CompletionStatus::new().with_status(status.0);
            }
            Reply::Gone => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "controller removed",
                ));
            }
        }
        Ok(completion)
    }
}

fn controller_state(suspended: bool, sq_count: u16) -> Vec<u8> {
    let mut header = lm::ControllerStateHeader::new_zeroed();
    header.ver = U16::new(1);
    header.csattr = lm::ControllerStateAttributes::new()
        .with_suspended(suspended)
        .into();
    header.nvmecss = U128::new(8 + 24 * u128::from(sq_count) * 2);

    let mut nvme = lm::NvmeControllerStateHeader::new_zeroed();
    nvme.niosq = U16::new(sq_count);
    nvme.niocq = U16::new(sq_count);

    let mut out = header.as_bytes().to_vec();
    out.extend_from_slice(nvme.as_bytes());
    for qid in 1..=sq_count {
        let mut sq = lm::IoSubmissionQueueState::new_zeroed();
        sq.prp1 = U64::new(0x10_0000 * u64::from(qid));
        sq.qid = U16::new(qid);
        sq.cqid = U16::new(qid);
        out.extend_from_slice(sq.as_bytes());
    }
    for qid in 1..=sq_count {
        let mut cq = lm::IoCompletionQueueState::new_zeroed();
        cq.qid = U16::new(qid);
        cq.attrs = U32::new(lm::IocqAttributes::new().with_iv(qid).into());
        out.extend_from_slice(cq.as_bytes());
    }
    out
}

#[test]
fn migrate_controller_state() {
    let state = controller_state(true, 2);
    let numd = (state.len() / 4) as u32;
    let mut receive_buffer = state.clone();
    receive_buffer.extend_from_slice(&[0; 4]);

    let source = FakeController::script([
        ok(0),
        Reply::Success {
            dw0: lm::MigrationReceiveDw0::new().with_suspended(true).into(),
            data: receive_buffer,
        },
    ]);
    let lm_source = LiveMigration::new(&source);

    let suspend = MigrationSend {
        suspend_type: SuspendType::SUSPEND,
        ..MigrationSend::suspend(1)
    };
    lm_source.migration_send(&suspend).unwrap();

    let data = lm_source
        .migration_receive(&MigrationReceive {
            cntlid: 1,
            numd,
            ..Default::default()
        })
        .unwrap();
    assert!(data.suspended());
    assert_eq!(data.buffer.len(), state.len() + 4);
    assert_eq!(data.state_bytes(), state.as_slice());

    let parsed = data.parse().unwrap();
    assert!(!parsed.truncated.any());
    assert_eq!(parsed.suspended(), Some(true));
    let nvme = parsed.nvme.unwrap();
    assert_eq!(nvme.submission_queues.len(), 2);
    assert_eq!(nvme.completion_queues[1].attributes().iv(), 2);

    assert_eq!(
        source.opcodes(),
        [
            spec::AdminOpcode::MIGRATION_SEND,
            spec::AdminOpcode::MIGRATION_RECEIVE
        ]
    );

    let target = FakeController::default();
    let lm_target = LiveMigration::new(&target);
    lm_target
        .migration_send(&MigrationSend::set_controller_state(3, data.state_bytes()))
        .unwrap();
    lm_target
        .migration_send(&MigrationSend::resume(3))
        .unwrap();

    let commands = target.commands();
    assert_eq!(commands[0].cdw10, 0x0003_0002);
    assert_eq!(commands[0].cdw11, 3);
    assert_eq!(commands[0].cdw15, numd);
    assert_eq!(commands[1].cdw10, 1);
    assert_eq!(target.inner.lock().received, [state]);
}

#[test]
fn cdq_lifecycle() {
    let controller = FakeController::script([ok(0x0007_0005), ok(0), ok(0), ok(0)]);
    let lm = LiveMigration::new(&controller);

    let params = CreateCdq::new(64);
    let mut queue = vec![0xff; params.queue_len()];
    let cdqid = lm.create_cdq(&params, &mut queue).unwrap();
    assert_eq!(cdqid, 5);
    assert!(queue.iter().all(|&b| b == 0));

    let mos = lm.track_send(&TrackSend::start_logging(cdqid)).unwrap();
    assert_eq!(mos, TrackSendMos::START_LOGGING);

    lm.set_cdq_feature(&SetCdqFeature {
        cdqid,
        hp: 2,
        tpt: None,
    })
    .unwrap();
    lm.delete_cdq(cdqid).unwrap();

    let commands = controller.commands();
    assert_eq!(commands[0].cdw12, 64);
    assert_eq!(commands[1].cdw10, 0x0001_0000);
    assert_eq!(commands[1].cdw11, 5);
    assert_eq!(commands[2].cdw12, 2);
    assert_eq!(commands[3].cdw10, 1);
    assert_eq!(commands[3].cdw11, 5);
}

#[test]
fn get_cdq_feature() {
    let mut feature = lm::CdqFeatureData::new_zeroed();
    feature.hp = U32::new(0x10);
    feature.tpt = U32::new(0x20);
    let controller = FakeController::script([Reply::Success {
        dw0: 0,
        data: feature.as_bytes().to_vec(),
    }]);
    let read = LiveMigration::new(&controller).get_cdq_feature(4).unwrap();
    assert_eq!(read, feature);
    assert_eq!(controller.commands()[0].cdw11, 4);
}

#[test]
fn invalid_requests_are_not_issued() {
    let controller = FakeController::default();
    let lm = LiveMigration::new(&controller);

    let mut queue = vec![0; 48];
    let err = lm.create_cdq(&CreateCdq::new(12), &mut queue).unwrap_err();
    assert!(matches!(
        err,
        OperationError::Validation(ValidationError::CdqSize(12))
    ));

    // Right size, wrong buffer.
    let err = lm.create_cdq(&CreateCdq::new(16), &mut queue).unwrap_err();
    assert!(matches!(
        err,
        OperationError::Validation(ValidationError::DataLength { .. })
    ));

    let track = TrackSend {
        stop: true,
        ..TrackSend::start_logging(1)
    };
    assert!(lm.track_send(&track).is_err());

    let err = lm
        .get_controller_state(&MigrationReceive {
            offset: 0x100,
            numd: 16,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, OperationError::Structural(_)));

    assert!(controller.commands().is_empty());
}

#[test]
fn truncated_state_is_returned() {
    let state = controller_state(false, 3);
    // Header, section header and two of the three submission queues.
    let short = state[..48 + 8 + 2 * 24].to_vec();
    let controller = FakeController::script([Reply::Success {
        dw0: 0,
        data: short,
    }]);
    let lm = LiveMigration::new(&controller);

    let parsed = lm
        .get_controller_state(&MigrationReceive {
            numd: (48 + 8 + 2 * 24) / 4 - 1,
            ..Default::default()
        })
        .unwrap();
    assert!(parsed.truncated.submission_queues());
    assert!(parsed.truncated.completion_queues());
    let nvme = parsed.nvme.unwrap();
    assert_eq!(nvme.submission_queues.len(), 2);
    assert!(nvme.completion_queues.is_empty());
}

#[test]
fn device_errors_pass_through() {
    let controller = FakeController::script([
        Reply::Status(spec::Status::INVALID_CONTROLLER_IDENTIFIER),
        Reply::Gone,
    ]);
    let lm = LiveMigration::new(&controller);

    let err = lm.migration_send(&MigrationSend::suspend(9)).unwrap_err();
    let OperationError::Request {
        opcode,
        source: RequestError::Nvme(nvme),
    } = err
    else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(opcode, spec::AdminOpcode::MIGRATION_SEND);
    assert_eq!(nvme.status(), spec::Status::INVALID_CONTROLLER_IDENTIFIER);

    let err = lm.delete_cdq(1).unwrap_err();
    assert!(matches!(
        err,
        OperationError::Request {
            source: RequestError::Transport(_),
            ..
        }
    ));
    assert_eq!(controller.commands().len(), 2);
}
