use std::{sync::Arc, time::Duration};

use xytable::{
    axis::{Axis, AxisLimits, AxisRegistry, IoChannel},
    backend::{MotionBackend, SimulatedBackend},
    config::{Config, MovementConfig},
    controller::MotionCoordinator,
    error::{CoordinatorError, ValidationError},
};

fn registry() -> AxisRegistry {
    let limits = AxisLimits {
        min_position: 0.0,
        max_position: 12.0,
        max_speed: 10.0,
    };
    AxisRegistry::new(limits, limits)
}

fn movement() -> MovementConfig {
    MovementConfig {
        command_timeout_ms: 1000,
        ..Default::default()
    }
}

async fn setup_with(
    backend: SimulatedBackend,
    movement: MovementConfig,
) -> (Arc<SimulatedBackend>, MotionCoordinator) {
    let backend = Arc::new(backend);
    backend.connect().await.unwrap();

    let coordinator = MotionCoordinator::new(backend.clone(), registry(), movement);
    (backend, coordinator)
}

async fn setup() -> (Arc<SimulatedBackend>, MotionCoordinator) {
    setup_with(SimulatedBackend::new(), movement()).await
}

#[tokio::test]
async fn move_within_limits_reaches_position() {
    let (backend, coordinator) = setup().await;

    coordinator
        .move_single_axis(Axis::X, 0.5, Some(3.0))
        .await
        .unwrap();

    let status = coordinator.get_status().await;
    assert!(!status.error_state);
    assert_eq!(status.x_axis.in_position, Some(true));
    assert_eq!(status.x_axis.position, Some(0.5));
    assert!(!status.movement_in_progress);
    assert_eq!(backend.calls(), vec!["move_axis x 0.5 3".to_string()]);
}

#[tokio::test]
async fn speed_above_ceiling_never_reaches_backend() {
    let (backend, coordinator) = setup().await;

    for axis in Axis::ALL {
        let err = coordinator
            .move_single_axis(axis, 0.5, Some(15.0))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CoordinatorError::Validation(ValidationError::SpeedExceedsLimit {
                axis,
                speed: 15.0,
                max: 10.0
            })
        );
        assert!(err.to_string().contains("exceeds maximum 10"));
    }

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn default_speed_is_checked_against_ceiling() {
    let movement = MovementConfig {
        default_speed: 50.0,
        ..movement()
    };
    let (backend, coordinator) = setup_with(SimulatedBackend::new(), movement).await;

    let err = coordinator
        .move_single_axis(Axis::Y, 1.0, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = coordinator
        .move_coordinated(1.0, 1.0, None)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn non_positive_speed_is_rejected() {
    let (_backend, coordinator) = setup().await;

    let err = coordinator
        .move_single_axis(Axis::X, 1.0, Some(0.0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Validation(ValidationError::SpeedNotPositive { .. })
    ));
}

#[tokio::test]
async fn absolute_targets_must_be_in_bounds() {
    let (backend, coordinator) = setup().await;

    let err = coordinator
        .move_absolute(1.0, 12.5, Some(2.0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Validation(ValidationError::PositionOutOfBounds { axis: Axis::Y, .. })
    ));
    assert!(backend.calls().is_empty());

    coordinator.move_absolute(1.0, 12.0, None).await.unwrap();
    assert_eq!(backend.position(Axis::Y), 12.0);
}

#[tokio::test]
async fn emergency_stop_blocks_all_motion() {
    let (backend, coordinator) = setup().await;

    coordinator.emergency_stop().await.unwrap();
    assert!(coordinator.is_emergency_stop_active());
    let dispatched = backend.calls().len();

    assert!(coordinator
        .move_single_axis(Axis::X, 1.0, None)
        .await
        .unwrap_err()
        .is_safety_blocked());
    assert!(coordinator
        .move_coordinated(1.0, 1.0, None)
        .await
        .unwrap_err()
        .is_safety_blocked());
    assert!(coordinator
        .move_absolute(1.0, 1.0, None)
        .await
        .unwrap_err()
        .is_safety_blocked());
    assert!(coordinator
        .home_axes(None)
        .await
        .unwrap_err()
        .is_safety_blocked());
    assert!(coordinator
        .home_axis(Axis::Y, None)
        .await
        .unwrap_err()
        .is_safety_blocked());
    assert!(coordinator
        .start_jog(Axis::X, 1, 2.0)
        .await
        .unwrap_err()
        .is_safety_blocked());

    assert_eq!(backend.calls().len(), dispatched);

    // Status stays available while stopped.
    let status = coordinator.get_status().await;
    assert!(status.emergency_stop_active);
}

#[tokio::test]
async fn clear_reenables_motion() {
    let (_backend, coordinator) = setup().await;

    coordinator.emergency_stop().await.unwrap();
    assert!(coordinator
        .move_absolute(1.0, 1.0, None)
        .await
        .unwrap_err()
        .is_safety_blocked());

    coordinator.clear_emergency_stop().await.unwrap();
    assert!(!coordinator.is_emergency_stop_active());

    coordinator.move_absolute(1.0, 1.0, None).await.unwrap();
}

#[tokio::test]
async fn failed_emergency_stop_keeps_flag_set() {
    let (backend, coordinator) = setup().await;
    backend.fail("emergency_stop");

    let err = coordinator.emergency_stop().await.unwrap_err();

    assert!(matches!(err, CoordinatorError::Backend { .. }));
    assert!(coordinator.is_emergency_stop_active());
}

#[tokio::test]
async fn emergency_stop_without_backend_keeps_flag_set() {
    let (backend, coordinator) = setup().await;
    backend.drop_connection();
    backend.refuse_connect(true);

    let err = coordinator.emergency_stop().await.unwrap_err();

    assert!(matches!(err, CoordinatorError::BackendUnavailable { .. }));
    assert!(coordinator.is_emergency_stop_active());
}

#[tokio::test]
async fn clear_requires_backend_success() {
    let (backend, coordinator) = setup().await;
    coordinator.emergency_stop().await.unwrap();

    backend.error("clear_emergency_stop");
    assert!(coordinator.clear_emergency_stop().await.is_err());
    assert!(coordinator.is_emergency_stop_active());

    backend.recover("clear_emergency_stop");
    backend.fail("clear_emergency_stop");
    assert!(coordinator.clear_emergency_stop().await.is_err());
    assert!(coordinator.is_emergency_stop_active());

    backend.recover("clear_emergency_stop");
    coordinator.clear_emergency_stop().await.unwrap();
    assert!(!coordinator.is_emergency_stop_active());
}

#[tokio::test]
async fn backend_estop_is_picked_up_by_status() {
    let (backend, coordinator) = setup().await;
    backend.press_estop();

    let status = coordinator.get_status().await;

    assert!(status.emergency_stop_active);
    assert!(coordinator
        .move_single_axis(Axis::X, 0.1, None)
        .await
        .unwrap_err()
        .is_safety_blocked());
}

#[tokio::test]
async fn concurrent_moves_are_serialized() {
    let (backend, coordinator) =
        setup_with(SimulatedBackend::with_latency(Duration::from_millis(50)), movement()).await;

    let (x, y) = tokio::join!(
        coordinator.move_single_axis(Axis::X, 1.0, None),
        coordinator.move_single_axis(Axis::Y, 2.0, None),
    );

    x.unwrap();
    y.unwrap();
    assert_eq!(backend.call_count("move_axis"), 2);
    assert_eq!(backend.max_concurrent_calls(), 1);
}

#[tokio::test]
async fn coordinated_move_sends_x_then_y() {
    let (backend, coordinator) = setup().await;

    coordinator
        .move_coordinated(1.0, -0.5, Some(2.0))
        .await
        .unwrap();

    assert_eq!(
        backend.calls(),
        vec!["move_axis x 1 2".to_string(), "move_axis y -0.5 2".to_string()]
    );
}

#[tokio::test]
async fn backend_rejection_is_reported() {
    let (backend, coordinator) = setup().await;
    backend.fail("move_axis");

    let err = coordinator
        .move_single_axis(Axis::X, 1.0, None)
        .await
        .unwrap_err();

    match err {
        CoordinatorError::Backend { operation, message } => {
            assert_eq!(operation, "move x axis");
            assert!(message.contains("rejected"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!coordinator.is_movement_in_progress());
}

#[tokio::test]
async fn reconnects_once_before_dispatch() {
    let (backend, coordinator) = setup().await;
    backend.drop_connection();
    backend.refuse_connect(true);

    let err = coordinator
        .move_single_axis(Axis::X, 1.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BackendUnavailable { .. }));
    assert_eq!(backend.call_count("move_axis"), 0);

    backend.refuse_connect(false);
    coordinator
        .move_single_axis(Axis::X, 1.0, None)
        .await
        .unwrap();
    assert!(backend.is_connected());
}

#[tokio::test]
async fn timed_out_command_releases_lock() {
    let movement = MovementConfig {
        command_timeout_ms: 50,
        ..movement()
    };
    let (_backend, coordinator) =
        setup_with(SimulatedBackend::with_latency(Duration::from_millis(300)), movement).await;

    let err = coordinator
        .move_single_axis(Axis::X, 1.0, None)
        .await
        .unwrap_err();

    match &err {
        CoordinatorError::Backend { message, .. } => assert!(message.contains("timed out")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!coordinator.is_movement_in_progress());

    let second = tokio::time::timeout(
        Duration::from_secs(2),
        coordinator.move_single_axis(Axis::Y, 1.0, None),
    )
    .await
    .expect("dispatch lock still held after timeout");
    assert!(second.is_err());
}

#[tokio::test]
async fn jog_lifecycle() {
    let (backend, coordinator) = setup().await;

    coordinator.start_jog(Axis::X, 1, 2.0).await.unwrap();
    assert!(coordinator.jog_session(Axis::X).await.is_some());
    assert!(backend.is_jogging(Axis::X));

    coordinator.stop_jog(Axis::X).await.unwrap();
    assert!(coordinator.jog_session(Axis::X).await.is_none());
    assert!(!backend.is_jogging(Axis::X));

    coordinator.stop_jog(Axis::Y).await.unwrap();
}

#[tokio::test]
async fn stop_without_session_succeeds_even_if_backend_fails() {
    let (backend, coordinator) = setup().await;
    backend.error("stop_jog");

    coordinator.stop_jog(Axis::Y).await.unwrap();
}

#[tokio::test]
async fn failed_stop_keeps_session() {
    let (backend, coordinator) = setup().await;
    coordinator.start_jog(Axis::Y, -1, 1.0).await.unwrap();
    backend.fail("stop_jog");

    assert!(coordinator.stop_jog(Axis::Y).await.is_err());
    assert!(coordinator.jog_session(Axis::Y).await.is_some());
}

#[tokio::test]
async fn jog_arguments_are_validated() {
    let (backend, coordinator) = setup().await;

    assert!(matches!(
        coordinator.start_jog(Axis::X, 0, 2.0).await,
        Err(CoordinatorError::Validation(
            ValidationError::InvalidDirection { direction: 0 }
        ))
    ));
    assert!(coordinator.start_jog(Axis::X, 1, 11.0).await.is_err());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn stop_all_jogs_halts_every_axis() {
    let (backend, coordinator) = setup().await;
    coordinator.start_jog(Axis::X, 1, 2.0).await.unwrap();
    coordinator.start_jog(Axis::Y, -1, 2.0).await.unwrap();

    coordinator.stop_all_jogs().await.unwrap();

    for axis in Axis::ALL {
        assert!(coordinator.jog_session(axis).await.is_none());
        assert!(!backend.is_jogging(axis));
    }
}

#[tokio::test]
async fn emergency_stop_drops_jog_sessions() {
    let (_backend, coordinator) = setup().await;
    coordinator.start_jog(Axis::X, 1, 2.0).await.unwrap();

    coordinator.emergency_stop().await.unwrap();

    assert!(coordinator.jog_session(Axis::X).await.is_none());
}

#[tokio::test]
async fn set_io_maps_names_to_channels() {
    let (backend, coordinator) = setup().await;

    coordinator.set_io("down", true).await.unwrap();
    coordinator.set_io("start", false).await.unwrap();

    assert!(backend.io_state(IoChannel::Down));
    assert!(!backend.io_state(IoChannel::Start));
    assert_eq!(
        backend.calls(),
        vec!["set_io 0 true".to_string(), "set_io 1 false".to_string()]
    );

    assert!(matches!(
        coordinator.set_io("spindle", true).await,
        Err(CoordinatorError::Validation(ValidationError::UnknownIo { .. }))
    ));
}

#[tokio::test]
async fn homing_resets_positions() {
    let (backend, coordinator) = setup().await;
    coordinator.move_absolute(3.0, 4.0, None).await.unwrap();

    coordinator.home_axis(Axis::X, None).await.unwrap();
    assert_eq!(backend.position(Axis::X), 0.0);
    assert_eq!(backend.position(Axis::Y), 4.0);

    coordinator.home_axes(Some(0.2)).await.unwrap();
    let status = coordinator.get_status().await;
    assert_eq!(status.y_axis.position, Some(0.0));
    assert_eq!(status.y_axis.homed, Some(true));
}

#[tokio::test]
async fn status_degrades_to_sentinels() {
    let (backend, coordinator) = setup().await;

    backend.set_status_unreachable(true);
    let status = coordinator.get_status().await;
    assert!(status.error_state);
    assert!(status.connected);
    assert_eq!(status.x_axis.position, None);
    assert!(status.error.is_some());

    backend.drop_connection();
    let status = coordinator.get_status().await;
    assert!(!status.connected);
    assert!(status.error_state);
}

#[tokio::test]
async fn shutdown_stops_jogs_and_disconnects() {
    let (backend, coordinator) = setup().await;
    coordinator.start_jog(Axis::Y, -1, 1.0).await.unwrap();

    coordinator.shutdown().await;

    assert!(!backend.is_jogging(Axis::Y));
    assert!(coordinator.jog_session(Axis::Y).await.is_none());
    assert!(!backend.is_connected());

    coordinator.connect().await.unwrap();
    assert!(backend.is_connected());
}

#[tokio::test]
async fn status_read_older_than_clear_does_not_reraise_stop() {
    let backend = SimulatedBackend::new().with_status_latency(Duration::from_millis(100));
    let (backend, coordinator) = setup_with(backend, movement()).await;

    coordinator.emergency_stop().await.unwrap();

    let (status, cleared) = tokio::join!(coordinator.get_status(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.clear_emergency_stop().await
    });

    cleared.unwrap();
    assert!(status.error.is_none());
    assert!(!coordinator.is_emergency_stop_active());

    coordinator.move_absolute(1.0, 1.0, None).await.unwrap();
    assert_eq!(backend.position(Axis::X), 1.0);
}

#[tokio::test]
async fn emergency_stop_blocks_moves_already_waiting_for_dispatch() {
    let (backend, coordinator) =
        setup_with(SimulatedBackend::with_latency(Duration::from_millis(200)), movement()).await;

    let (running, queued, stopped, active_while_waiting) = tokio::join!(
        coordinator.move_single_axis(Axis::X, 1.0, None),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            coordinator.move_single_axis(Axis::Y, 1.0, None).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            coordinator.emergency_stop().await
        },
        async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            coordinator.is_emergency_stop_active()
        },
    );

    running.unwrap();
    stopped.unwrap();
    assert!(active_while_waiting);
    assert!(queued.unwrap_err().is_safety_blocked());
    assert_eq!(
        backend.calls(),
        vec!["move_axis x 1 1".to_string(), "emergency_stop".to_string()]
    );
    assert_eq!(backend.position(Axis::Y), 0.0);
}

#[tokio::test]
async fn coordinated_move_keeps_x_when_y_fails() {
    let (backend, coordinator) = setup().await;
    backend.fail_axis(Axis::Y, true);

    let err = coordinator
        .move_coordinated(0.5, 0.5, None)
        .await
        .unwrap_err();

    match err {
        CoordinatorError::Backend { operation, .. } => assert_eq!(operation, "move y axis"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(backend.position(Axis::X), 0.5);
    assert_eq!(backend.position(Axis::Y), 0.0);
    assert_eq!(
        backend.calls(),
        vec!["move_axis x 0.5 1".to_string(), "move_axis y 0.5 1".to_string()]
    );
    assert!(!coordinator.is_movement_in_progress());
}

#[tokio::test]
async fn omitted_speed_uses_movement_default_not_axis_default() {
    let backend = Arc::new(SimulatedBackend::new());
    backend.connect().await.unwrap();

    let mut config = Config::default();
    config.table.x_axis.default_speed = 5.0;
    config.movement.default_speed = 2.0;
    let coordinator = MotionCoordinator::from_config(backend.clone(), &config);

    coordinator
        .move_single_axis(Axis::X, 0.5, None)
        .await
        .unwrap();

    assert_eq!(backend.calls(), vec!["move_axis x 0.5 2".to_string()]);
}
