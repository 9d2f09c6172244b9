//! End-to-end tests driving the interpreter through `execute_line`, the
//! same entry point the `Diag>` prompt uses.

use discdiag::device::{BlockDevice, BreakFlag, SimDevice};
use discdiag::interp::{Interpreter, Outcome};

fn new_interp() -> Interpreter {
    Interpreter::new(Box::new(SimDevice::new()), BreakFlag::new_unarmed())
}

fn run(interp: &mut Interpreter, line: &str) -> Outcome {
    interp.execute_line(line)
}

fn var(interp: &Interpreter, name: &str) -> Option<i64> {
    interp.vars.find(name)
}

#[test]
fn immediate_mode_variables_persist_across_prompt_lines() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "s x 5"), Outcome::Ok);
    assert_eq!(var(&interp, "x"), Some(5));
    // A second, unrelated line must still see x: the bottom frame's own
    // locals are never purged, matching the original's poplvl behaviour.
    assert_eq!(run(&mut interp, "s y x+1"), Outcome::Ok);
    assert_eq!(var(&interp, "y"), Some(6));
    assert_eq!(var(&interp, "x"), Some(5));
}

#[test]
fn procedure_call_params_are_local_and_vanish_on_return() {
    let mut interp = new_interp();
    // "result" is declared up front so the callee's `set` mutates this
    // existing binding in place instead of pushing a fresh one that would
    // be wiped the moment the callee's own frame pops.
    run(&mut interp, "s result 0");
    run(&mut interp, "1 greet(n): s result n*2; end");
    assert_eq!(run(&mut interp, "2 caller: greet(21); end"), Outcome::Ok);
    // greet's own parameter "n" must not leak into the caller's scope.
    assert_eq!(var(&interp, "n"), None);
    assert_eq!(var(&interp, "result"), Some(42));
}

#[test]
fn local_shadows_and_is_purged_on_frame_pop() {
    let mut interp = new_interp();
    run(&mut interp, "s v 100");
    run(&mut interp, "1 inner: local v; s v 1; end");
    assert_eq!(run(&mut interp, "2 outer: inner; end"), Outcome::Ok);
    // The shadowing local is gone once inner's frame pops.
    assert_eq!(var(&interp, "v"), Some(100));
}

#[test]
fn loop_runs_exactly_stopcount_times() {
    let mut interp = new_interp();
    run(&mut interp, "s cnt 0");
    let outcome = run(&mut interp, "1 go(): s cnt cnt+1; l 5; end");
    assert_eq!(outcome, Outcome::Ok);
    run(&mut interp, "go");
    assert_eq!(var(&interp, "cnt"), Some(5));
}

#[test]
fn for_loop_iterates_expected_count_with_positive_step() {
    let mut interp = new_interp();
    run(&mut interp, "s n 0");
    run(&mut interp, "1 go(): for i 0 9 2; s n n+1; fend; end");
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    // 0,2,4,6,8 -> 5 iterations: floor((9-0)/2)+1
    assert_eq!(var(&interp, "n"), Some(5));
}

#[test]
fn for_loop_with_start_past_end_skips_body_entirely() {
    let mut interp = new_interp();
    run(&mut interp, "s n 0");
    run(&mut interp, "1 go(): for i 9 0 1; s n n+1; fend; end");
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    assert_eq!(var(&interp, "n"), Some(0));
}

#[test]
fn repeat_until_runs_body_at_least_once() {
    let mut interp = new_interp();
    run(&mut interp, "s n 0");
    run(&mut interp, "1 go(): repeat; s n n+1; until 1; end");
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    assert_eq!(var(&interp, "n"), Some(1));
}

#[test]
fn while_wend_runs_body_zero_times_when_false() {
    let mut interp = new_interp();
    run(&mut interp, "s n 0");
    run(&mut interp, "1 go(): while 0; s n n+1; wend; end");
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    assert_eq!(var(&interp, "n"), Some(0));
}

#[test]
fn while_wend_counts_down() {
    let mut interp = new_interp();
    run(&mut interp, "s n 3");
    run(&mut interp, "s total 0");
    run(&mut interp, "1 go(): while n; s total total+n; s n n-1; wend; end");
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    assert_eq!(var(&interp, "total"), Some(6));
}

#[test]
fn select_case_matches_the_right_branch() {
    let mut interp = new_interp();
    run(&mut interp, "s hit 0");
    run(
        &mut interp,
        "1 go(): select 2; case 1; s hit 1; send; case 2; s hit 2; send; default; s hit 9; send; end",
    );
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    assert_eq!(var(&interp, "hit"), Some(2));
}

#[test]
fn select_falls_through_to_default_when_nothing_matches() {
    let mut interp = new_interp();
    run(&mut interp, "s hit 0");
    run(
        &mut interp,
        "1 go(): select 99; case 1; s hit 1; send; default; s hit 9; send; end",
    );
    assert_eq!(run(&mut interp, "go"), Outcome::Ok);
    assert_eq!(var(&interp, "hit"), Some(9));
}

#[test]
fn if_false_skips_rest_of_line() {
    let mut interp = new_interp();
    run(&mut interp, "s n 0");
    run(&mut interp, "s n 1; if 0; s n 2");
    assert_eq!(var(&interp, "n"), Some(1));
}

#[test]
fn go_jumps_to_a_label() {
    let mut interp = new_interp();
    run(&mut interp, "1 skip: s n 1; end");
    run(&mut interp, "2 start: go skip");
    assert_eq!(run(&mut interp, "start"), Outcome::Ok);
    assert_eq!(var(&interp, "n"), Some(1));
}

#[test]
fn end_at_immediate_mode_is_an_error() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "end"), Outcome::Ok);
}

#[test]
fn seeded_rng_produces_a_deterministic_sequence() {
    let mut a = new_interp();
    let mut b = new_interp();
    run(&mut a, "srand");
    run(&mut b, "srand");
    run(&mut a, "s x rand");
    run(&mut b, "s x rand");
    assert_eq!(var(&a, "x"), var(&b, "x"));
}

#[test]
fn pattn_then_comp_round_trips_for_every_fill_pattern() {
    for pat in ["cnt", "dwcnt", "val", "rand", "lba"] {
        let mut interp = new_interp();
        interp.device.set_drive(0).unwrap();
        interp.writeprot = false;
        assert_eq!(run(&mut interp, &format!("pattn {} 7 4", pat)), Outcome::Ok);
        assert_eq!(run(&mut interp, "w 0 4"), Outcome::Ok);
        assert_eq!(run(&mut interp, "r 0 4"), Outcome::Ok);
        assert_eq!(run(&mut interp, &format!("comp {} 7 4", pat)), Outcome::Ok, "pattern {}", pat);
    }
}

#[test]
fn comp_buffs_detects_identical_and_differing_buffers() {
    let mut interp = new_interp();
    interp.device.set_drive(0).unwrap();
    interp.writeprot = false;
    run(&mut interp, "pattn cnt 0 2");
    run(&mut interp, "w 0 2");
    run(&mut interp, "r 0 2");
    assert_eq!(run(&mut interp, "comp buffs 0 2"), Outcome::Ok);

    // Corrupt one written sector before comparing again.
    interp.writebuffer[0] ^= 0xff;
    assert_eq!(run(&mut interp, "comp buffs 0 2"), Outcome::Ok);
}

#[test]
fn write_is_rejected_while_drive_is_write_protected() {
    let mut interp = new_interp();
    interp.device.set_drive(0).unwrap();
    assert!(interp.writeprot);
    assert_eq!(run(&mut interp, "w 0 1"), Outcome::Error);
}

#[test]
fn read_rejects_a_sector_count_over_the_buffer_limit() {
    let mut interp = new_interp();
    interp.device.set_drive(0).unwrap();
    assert_eq!(run(&mut interp, "r 0 9999"), Outcome::Error);
}

#[test]
fn read_rejects_an_lba_past_the_end_of_the_drive() {
    let mut interp = new_interp();
    interp.device.set_drive(0).unwrap();
    assert_eq!(run(&mut interp, "r 10000 1"), Outcome::Error);
}

#[test]
fn read_without_a_selected_drive_is_an_error() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "r 0 1"), Outcome::Error);
}

#[test]
fn pattn_rejects_a_sector_count_over_the_buffer_limit() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "pattn cnt 0 99999"), Outcome::Error);
}

#[test]
fn unknown_command_reports_an_error_and_does_not_panic() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "boguscommand"), Outcome::Ok);
}

#[test]
fn exit_command_is_reported_to_the_driver_loop() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "exit"), Outcome::Exit);
}

#[test]
fn program_line_entry_does_not_execute_the_line() {
    let mut interp = new_interp();
    assert_eq!(run(&mut interp, "1 later: s n 99"), Outcome::Ok);
    assert_eq!(var(&interp, "n"), None);
    assert_eq!(interp.program.lines.len(), 1);
}
