//! Property-based tests for the fiber
//!
//! Random call trees are driven to completion with and without a
//! serialization round trip at every suspension point.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Test Program
// ============================================================================

/// A tree of frames: each node waits for some messages, then calls each
/// child in order, then completes with the number of messages its subtree saw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Program {
    waits: u8,
    children: Vec<Program>,
    fail: bool,
}

impl Program {
    fn total_waits(&self) -> usize {
        usize::from(self.waits) + self.children.iter().map(Program::total_waits).sum::<usize>()
    }

    fn has_failure(&self) -> bool {
        self.fail || self.children.iter().any(Program::has_failure)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Runner {
    program: Program,
    next_child: usize,
    waits_left: u8,
    seen: i64,
}

impl Runner {
    fn new(program: Program) -> Self {
        let waits_left = program.waits;
        Self {
            program,
            next_child: 0,
            waits_left,
            seen: 0,
        }
    }
}

fn step(
    runner: &mut Runner,
    rest: &str,
    outcome: Outcome,
    h: &mut Handle<'_, Runner>,
    log: &mut Vec<String>,
) -> Result<(), Fault> {
    let item = outcome?;
    log.push(format!("{}:{rest}", h.depth()));
    match rest {
        "message" => {
            let _: String = item.get()?;
            runner.seen += 1;
        }
        "child_done" => runner.seen += item.get::<i64>()?,
        _ => {}
    }

    if runner.waits_left > 0 {
        runner.waits_left -= 1;
        h.wait("message", String::KIND);
    } else if let Some(child) = runner.program.children.get(runner.next_child).cloned() {
        runner.next_child += 1;
        h.call(Runner::new(child), "start", Item::unit(), "child_done", i64::KIND);
    } else if runner.program.fail {
        return Err(Fault::dialog("program failed"));
    } else {
        h.done(Ok(Item::new(&runner.seen)?));
    }
    Ok(())
}

/// Drive a program to completion. Returns the final poll result, the
/// continuation log, and the number of messages posted.
fn drive(program: &Program, round_trip: bool) -> (Result<Need, String>, Vec<String>, usize) {
    let (result, log, posted, _) = drive_fiber(program, round_trip);
    (result.map_err(|e| e.to_string()), log, posted)
}

/// Like `drive`, but hands back the fiber as it was left
fn drive_fiber(program: &Program, round_trip: bool) -> (Result<Need, FiberError>, Vec<String>, usize, Fiber<Runner>) {
    let mut fiber = Fiber::new();
    let mut log = Vec::new();
    let mut posted = 0;
    fiber
        .call(Runner::new(program.clone()), "start", Item::unit())
        .unwrap();

    loop {
        let result = fiber.poll(|r, rest, outcome, h| step(r, rest, outcome, h, &mut log));
        match result {
            Ok(Need::Wait) => {
                if round_trip {
                    let blob = serde_json::to_vec(&fiber).unwrap();
                    fiber = serde_json::from_slice(&blob).unwrap();
                }
                fiber
                    .post(Ok(Item::new(&format!("m{posted}")).unwrap()))
                    .unwrap();
                posted += 1;
            }
            result => return (result, log, posted, fiber),
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_program(allow_failure: bool) -> impl Strategy<Value = Program> {
    let leaf = (0u8..3, proptest::bool::weighted(if allow_failure { 0.2 } else { 0.0 }))
        .prop_map(|(waits, fail)| Program {
            waits,
            children: vec![],
            fail,
        });
    leaf.prop_recursive(4, 24, 3, |inner| {
        (0u8..3, proptest::collection::vec(inner, 0..3)).prop_map(|(waits, children)| Program {
            waits,
            children,
            fail: false,
        })
    })
}

/// Mark one leaf as failing, chosen by walking down with `path`
fn plant_failure(program: &mut Program, mut path: usize) {
    let mut node = program;
    while !node.children.is_empty() {
        let len = node.children.len();
        let index = path % len;
        path /= len;
        node = &mut node.children[index];
    }
    node.fail = true;
}

fn arb_failing_program() -> impl Strategy<Value = Program> {
    (arb_program(false), any::<usize>()).prop_map(|(mut program, path)| {
        plant_failure(&mut program, path);
        program
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Balanced call trees always end Done with an empty stack
    #[test]
    fn prop_balanced_programs_complete(program in arb_program(false)) {
        let (result, _, posted) = drive(&program, false);
        prop_assert_eq!(result, Ok(Need::Done));
        prop_assert_eq!(posted, program.total_waits());
    }

    // Serializing at every wait does not change what runs
    #[test]
    fn prop_round_trip_matches_in_process(program in arb_program(true)) {
        let direct = drive(&program, false);
        let restored = drive(&program, true);
        prop_assert_eq!(direct, restored);
    }

    // Faults with no handler reach the top and leave nothing behind
    #[test]
    fn prop_unhandled_fault_empties_stack(program in arb_failing_program(), round_trip in any::<bool>()) {
        prop_assert!(program.has_failure());
        let (result, _, _, fiber) = drive_fiber(&program, round_trip);
        match result {
            Err(FiberError::Unhandled(fault)) => {
                prop_assert!(fault.message.contains("program failed"), "unexpected fault: {}", fault);
            }
            other => prop_assert!(false, "expected unhandled fault, got {:?}", other),
        }
        prop_assert!(fiber.is_empty());
    }

    // Polling while suspended neither runs continuations nor changes state
    #[test]
    fn prop_poll_idempotent_while_waiting(program in arb_program(false)) {
        let mut fiber = Fiber::new();
        fiber.call(Runner::new(program), "start", Item::unit()).unwrap();
        let mut log = Vec::new();
        let need = fiber.poll(|r, rest, outcome, h| step(r, rest, outcome, h, &mut log)).unwrap();
        if need == Need::Wait {
            let before = serde_json::to_value(&fiber).unwrap();
            let runs = log.len();
            let again = fiber.poll(|r, rest, outcome, h| step(r, rest, outcome, h, &mut log)).unwrap();
            prop_assert_eq!(again, Need::Wait);
            prop_assert_eq!(log.len(), runs);
            prop_assert_eq!(serde_json::to_value(&fiber).unwrap(), before);
        }
    }

    // Depth never exceeds the tree height and frames below the top are
    // always suspended in Call
    #[test]
    fn prop_frames_below_top_wait_on_call(program in arb_program(false)) {
        let mut fiber = Fiber::new();
        fiber.call(Runner::new(program), "start", Item::unit()).unwrap();
        let mut log = Vec::new();
        let mut n = 0;
        while fiber.poll(|r, rest, outcome, h| step(r, rest, outcome, h, &mut log)).unwrap() == Need::Wait {
            let frames = fiber.frames();
            let (top, below) = frames.split_last().unwrap();
            prop_assert_eq!(top.wait.need, Need::Wait);
            prop_assert!(below.iter().all(|f| f.wait.need == Need::Call));
            prop_assert!(frames.iter().all(|f| f.target().is_some()));
            fiber.post(Ok(Item::new(&format!("m{n}")).unwrap())).unwrap();
            n += 1;
        }
        prop_assert!(fiber.is_empty());
    }
}

#[test]
fn test_leaf_fault_in_first_continuation_seen_by_root_once() {
    let program = Program {
        waits: 0,
        children: vec![Program {
            waits: 0,
            children: vec![],
            fail: true,
        }],
        fail: false,
    };
    let mut fiber = Fiber::new();
    fiber.call(Runner::new(program), "start", Item::unit()).unwrap();

    let mut root_faults = 0;
    let err = fiber
        .poll(|r, rest, outcome, h| {
            if h.depth() == 1 && rest == "child_done" && outcome.is_err() {
                root_faults += 1;
            }
            step(r, rest, outcome, h, &mut Vec::new())
        })
        .unwrap_err();

    assert_eq!(root_faults, 1);
    assert!(matches!(err, FiberError::Unhandled(_)));
    assert!(fiber.is_empty());
}
