//! Integration tests for transform resolution

use camstream_core::transform::{resolve, Mirror, Transform};
use camstream_core::ConfigError;

const MIRRORS: [Mirror; 4] = [Mirror::None, Mirror::Horizontal, Mirror::Vertical, Mirror::Both];

#[test]
fn test_mirror_both_half_turn_cancels() {
    let transform = resolve(Mirror::Both, 180).unwrap();
    assert_eq!(
        transform,
        Transform::HFLIP.then(Transform::VFLIP).then(Transform::ROT180)
    );
    assert!(transform.is_identity());
}

#[test]
fn test_rotation_without_mirror() {
    assert_eq!(resolve(Mirror::None, 0).unwrap(), Transform::IDENTITY);
    assert_eq!(resolve(Mirror::None, 90).unwrap(), Transform::ROT90);
    assert_eq!(resolve(Mirror::None, 180).unwrap(), Transform::ROT180);
    assert_eq!(resolve(Mirror::None, 270).unwrap(), Transform::ROT270);
}

#[test]
fn test_rotation_is_taken_modulo_360() {
    for mirror in MIRRORS {
        assert_eq!(resolve(mirror, 450).unwrap(), resolve(mirror, 90).unwrap());
        assert_eq!(resolve(mirror, -90).unwrap(), resolve(mirror, 270).unwrap());
        assert_eq!(resolve(mirror, 720).unwrap(), resolve(mirror, 0).unwrap());
    }
}

#[test]
fn test_illegal_rotation_never_clamped() {
    for rotation in [1, 45, 89, 181, -30] {
        match resolve(Mirror::None, rotation) {
            Err(ConfigError::IllegalRotation(value)) => assert_eq!(value, rotation),
            other => panic!("rotation {} resolved to {:?}", rotation, other),
        }
    }
}

#[test]
fn test_mirror_applied_before_rotation() {
    let transform = resolve(Mirror::Horizontal, 90).unwrap();
    assert_eq!(transform, Transform::HFLIP.then(Transform::ROT90));
    assert_ne!(transform, Transform::ROT90.then(Transform::HFLIP));
}

#[test]
fn test_resolved_transform_has_inverse() {
    for mirror in MIRRORS {
        for rotation in [0, 90, 180, 270] {
            let transform = resolve(mirror, rotation).unwrap();
            assert!(transform.then(transform.inverse()).is_identity());
        }
    }
}

#[test]
fn test_mirror_parsing() {
    assert_eq!("Horizontal".parse::<Mirror>().unwrap(), Mirror::Horizontal);
    assert!("sideways".parse::<Mirror>().is_err());
    assert_eq!(Mirror::parse_lenient("sideways"), Mirror::None);
    assert_eq!(Mirror::Both.to_string(), "both");
}
