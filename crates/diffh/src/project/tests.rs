use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;

/// Shifts eastings by the zone's false easting so results are distinguishable.
struct Shift;

impl Geodesy for Shift {
    fn transform(
        &self,
        source: Zone,
        _target: CanonicalSystem,
        coords: &[Vector2<f64>],
    ) -> Result<Vec<Vector2<f64>>, GeodesyError> {
        let off = source.digit() as f64 * 1_000_000.0;
        Ok(coords.iter().map(|c| Vector2::new(c.x - off, c.y)).collect())
    }
}

/// Fails every call made from a rayon worker thread; records call sizes.
struct FailsInPool {
    calls: Mutex<Vec<usize>>,
}

impl Geodesy for FailsInPool {
    fn transform(
        &self,
        source: Zone,
        target: CanonicalSystem,
        coords: &[Vector2<f64>],
    ) -> Result<Vec<Vector2<f64>>, GeodesyError> {
        if rayon::current_thread_index().is_some() {
            return Err(GeodesyError("device lost".into()));
        }
        self.calls.lock().unwrap().push(coords.len());
        Shift.transform(source, target, coords)
    }
}

struct AlwaysFails(AtomicUsize);

impl Geodesy for AlwaysFails {
    fn transform(
        &self,
        _source: Zone,
        _target: CanonicalSystem,
        _coords: &[Vector2<f64>],
    ) -> Result<Vec<Vector2<f64>>, GeodesyError> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Err(GeodesyError("unknown CRS".into()))
    }
}

fn mixed_items() -> Vec<(Zone, Vector2<f64>)> {
    vec![
        (Zone::Z7, Vector2::new(7_466_893.0, 5_958_143.0)),
        (Zone::Z6, Vector2::new(6_500_000.0, 5_800_000.0)),
        (Zone::Z7, Vector2::new(7_400_000.0, 5_900_000.0)),
        (Zone::Z5, Vector2::new(5_500_000.0, 5_700_000.0)),
    ]
}

#[test]
fn sequential_path_preserves_input_order_across_zones() {
    let cfg = ProjectCfg {
        batch_size: 1,
        ..ProjectCfg::default()
    };
    let d = Dispatcher::new(&Shift, Accelerator::disabled(), cfg);
    let out = d.project_pairs(&mixed_items()).unwrap();
    assert_eq!(out[0], Vector2::new(466_893.0, 5_958_143.0));
    assert_eq!(out[1], Vector2::new(500_000.0, 5_800_000.0));
    assert_eq!(out[2], Vector2::new(400_000.0, 5_900_000.0));
    assert_eq!(out[3], Vector2::new(500_000.0, 5_700_000.0));
    let r = d.report();
    assert_eq!(r.batches, 4);
    assert_eq!(r.accelerated_batches, 0);
    assert!(!r.fell_back);
}

#[test]
fn accelerated_path_matches_sequential() {
    let items: Vec<_> = (0..2_000)
        .map(|i| (Zone::Z7, Vector2::new(7_400_000.0 + i as f64, 5_900_000.0)))
        .collect();
    let cfg = ProjectCfg {
        chunk_size: 64,
        ..ProjectCfg::default()
    };
    let seq = Dispatcher::new(&Shift, Accelerator::disabled(), cfg)
        .project_pairs(&items)
        .unwrap();
    let fast = Dispatcher::new(&Shift, Accelerator::with_threads(4), cfg);
    assert_eq!(fast.project_pairs(&items).unwrap(), seq);
    assert_eq!(fast.report().accelerated_batches, 1);
}

#[test]
fn accelerator_failure_falls_back_permanently() {
    let geo = FailsInPool {
        calls: Mutex::new(Vec::new()),
    };
    let cfg = ProjectCfg {
        batch_size: 2,
        chunk_size: 1,
        ..ProjectCfg::default()
    };
    let d = Dispatcher::new(&geo, Accelerator::with_threads(2), cfg);
    let out = d.project_pairs(&mixed_items()).unwrap();
    assert_eq!(out[0].x, 466_893.0);
    let r = d.report();
    assert!(r.fell_back);
    assert_eq!(r.accelerated_batches, 0);
    // Every batch was served by exactly one sequential call.
    assert_eq!(geo.calls.lock().unwrap().len(), r.batches);
}

#[test]
fn sequential_failure_is_fatal() {
    let geo = AlwaysFails(AtomicUsize::new(0));
    let d = Dispatcher::new(&geo, Accelerator::disabled(), ProjectCfg::default());
    let err = d.project_pairs(&mixed_items()).unwrap_err();
    assert!(matches!(err, ProjectionError::Transform { zone: Zone::Z5, .. }));
    // Aborts at the first failing batch.
    assert_eq!(geo.0.load(Ordering::Relaxed), 1);
}

#[test]
fn project_points_fills_canonical_coordinates() {
    let mut pts = vec![Point {
        id: "1001".into(),
        x_raw: 5_958_143.5,
        y_raw: 7_466_893.08,
        axis: crate::point::AxisConvention::NorthingFirst,
        zone: Zone::Z7,
        canon: None,
        h: Some(137.9),
        origin: crate::point::Origin::Input,
    }];
    let d = Dispatcher::new(&Shift, Accelerator::disabled(), ProjectCfg::default());
    d.project_points(&mut pts).unwrap();
    let c = pts[0].canonical().unwrap();
    assert!((c.x - 466_893.08).abs() < 1e-6);
    assert_eq!(c.y, 5_958_143.5);
}
