//! End-to-end test of the path follower driving a telemetry recorder, the
//! way `Controller::feedback_loop` does internally, without the network
//! stack in the loop.

use manipulator::path::{PathFollower, PathFollowerConfig, Vector3};
use manipulator::Telemetry;

fn add(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: Vector3, k: f64) -> Vector3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

#[test]
fn following_a_bent_path_completes_and_records_telemetry() {
    let waypoints = vec![[0.0, 0.0, 0.0], [0.05, 0.0, 0.0], [0.05, 0.05, 0.0]];
    let mut follower = PathFollower::new(&waypoints, 0.02, PathFollowerConfig::default());
    let mut telemetry = Telemetry::new();

    let mut position = [0.0, 0.0, 0.0];
    let mut velocity = [0.0, 0.0, 0.0];
    let mut completed = false;

    for cycle in 0..20_000 {
        let (v, _a, done) = follower.step(position, velocity);
        telemetry.append_scalar("t", cycle as f64 * 0.01);
        telemetry.append_vector("positions", &position);
        telemetry.append_vector("commanded_velocity", &v);

        position = add(position, scale(v, 0.01));
        velocity = v;
        if done {
            completed = true;
            break;
        }
    }

    assert!(completed, "follower never completed the bent path");

    let mut buf = Vec::new();
    telemetry.write_csv(&mut buf).unwrap();
    let csv = String::from_utf8(buf).unwrap();
    let line_count = csv.lines().count();
    assert!(line_count > 1, "telemetry csv should contain a header and at least one sample row");

    let header = csv.lines().next().unwrap();
    assert_eq!(header, "t,positions_0,positions_1,positions_2,commanded_velocity_0,commanded_velocity_1,commanded_velocity_2");
}
