use super::*;
use crate::point::{AxisConvention, Origin, RawRecord, Zone};

fn rec(x: &str, y: &str) -> RawRecord {
    RawRecord::new(None, x, y, Some("100.0"))
}

#[test]
fn parses_decimal_comma_and_rejects_garbage() {
    assert_eq!(parse_number(" 5958143,50 "), Some(5_958_143.5));
    assert_eq!(parse_number("137.9"), Some(137.9));
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_number("abc"), None);
    assert_eq!(parse_number("NaN"), None);
}

#[test]
fn northing_first_decided_by_second_column_band() {
    // First row ambiguous (5.9M vs 7.4M: both in a band), second decides.
    let records = vec![
        rec("5958143.50", "7466893.08"),
        rec("4958143.50", "7466893.08"),
    ];
    let c = classify(&records, Origin::Input, &ClassifyCfg::default()).unwrap();
    assert_eq!(c.detection.axis, AxisConvention::NorthingFirst);
    assert_eq!(c.detection.zone, Zone::Z7);
    assert_eq!(c.detection.ambiguous_rows, 1);
    assert!(!c.detection.defaulted);
    assert_eq!(c.points[0].source_xy().x, 7_466_893.08);
}

#[test]
fn easting_first_is_detected() {
    let records = vec![rec("6501234.00", "4321000.00"), rec("6501240.00", "4321010.00")];
    let c = classify(&records, Origin::Reference, &ClassifyCfg::default()).unwrap();
    assert_eq!(c.detection.axis, AxisConvention::EastingFirst);
    assert_eq!(c.detection.zone, Zone::Z6);
    assert!(c.points.iter().all(|p| p.origin == Origin::Reference));
}

#[test]
fn all_ambiguous_defaults_to_northing_first() {
    let records = vec![rec("5958143.50", "7466893.08")];
    let c = classify(&records, Origin::Input, &ClassifyCfg::default()).unwrap();
    assert!(c.detection.defaulted);
    assert_eq!(c.detection.axis, AxisConvention::NorthingFirst);
    assert_eq!(c.detection.zone, Zone::Z7);
}

#[test]
fn override_short_circuits_heuristic() {
    let records = vec![rec("5958143.50", "7466893.08")];
    let cfg = ClassifyCfg {
        input_axis: Some(AxisConvention::EastingFirst),
        ..ClassifyCfg::default()
    };
    let c = classify(&records, Origin::Input, &cfg).unwrap();
    assert_eq!(c.detection.axis, AxisConvention::EastingFirst);
    // Easting taken from the first column: zone 5.
    assert_eq!(c.detection.zone, Zone::Z5);
}

#[test]
fn non_numeric_coordinate_names_row_and_column() {
    let records = vec![rec("5958143.50", "7466893.08"), rec("5958143.50", "n/a")];
    let err = classify(&records, Origin::Input, &ClassifyCfg::default()).unwrap_err();
    assert_eq!(
        err,
        ClassificationError::NonNumeric {
            row: 2,
            column: "y",
            value: "n/a".into()
        }
    );
}

#[test]
fn contradicting_rows_are_rejected() {
    let records = vec![rec("4958143.50", "7466893.08"), rec("7466893.08", "4958143.50")];
    let err = detect(
        &[(4_958_143.5, 7_466_893.08), (7_466_893.08, 4_958_143.5)],
        None,
    )
    .unwrap_err();
    assert_eq!(
        err,
        ClassificationError::InconsistentAxis {
            row: 2,
            established_by: 1
        }
    );
    assert!(classify(&records, Origin::Input, &ClassifyCfg::default()).is_err());
}

#[test]
fn mixed_zones_are_rejected() {
    let err = detect(&[(4_958_143.5, 7_466_893.08), (4_958_143.5, 6_466_893.08)], None)
        .unwrap_err();
    assert!(matches!(
        err,
        ClassificationError::InconsistentZone {
            row: 2,
            found: Zone::Z6,
            expected: Zone::Z7
        }
    ));
}

#[test]
fn out_of_band_pair_has_no_zone() {
    let err = detect(&[(100.0, 200.0)], None).unwrap_err();
    assert!(matches!(err, ClassificationError::NoZone { row: 1, .. }));
    assert_eq!(detect(&[], None).unwrap_err(), ClassificationError::Empty);
}

#[test]
fn missing_ids_are_autonumbered_and_heights_optional() {
    let records = vec![
        RawRecord::new(Some("A1"), "5958143.50", "7466893.08", Some("137,90")),
        RawRecord::new(None, "5958150.00", "7466899.00", Some("brak")),
        RawRecord::new(Some("  "), "5958160.00", "7466899.00", None),
    ];
    let c = classify(&records, Origin::Input, &ClassifyCfg::default()).unwrap();
    let ids: Vec<_> = c.points.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["A1", "P_2", "P_3"]);
    assert_eq!(c.points[0].h, Some(137.9));
    assert_eq!(c.points[1].h, None);
    assert_eq!(c.points[2].h, None);
    assert!(c.points.iter().all(|p| p.canon.is_none()));
}

#[test]
fn repeated_ids_are_rejected() {
    let explicit = vec![
        RawRecord::new(Some("A"), "5958143.50", "7466893.08", None),
        RawRecord::new(Some(" A "), "5958150.00", "7466899.00", None),
    ];
    let err = classify(&explicit, Origin::Input, &ClassifyCfg::default()).unwrap_err();
    assert_eq!(
        err,
        ClassificationError::DuplicateId {
            row: 2,
            id: "A".into(),
            first_row: 1,
        }
    );

    // Row 3 has no id and is numbered `P_3`, which row 4 also claims.
    let generated = vec![
        RawRecord::new(Some("A"), "5958143.50", "7466893.08", None),
        RawRecord::new(Some("B"), "5958150.00", "7466899.00", None),
        RawRecord::new(None, "5958160.00", "7466899.00", None),
        RawRecord::new(Some("P_3"), "5958170.00", "7466899.00", None),
    ];
    let err = classify(&generated, Origin::Reference, &ClassifyCfg::default()).unwrap_err();
    assert_eq!(
        err,
        ClassificationError::DuplicateId {
            row: 4,
            id: "P_3".into(),
            first_row: 3,
        }
    );
}

#[test]
fn input_rounding_uses_half_even() {
    let records = vec![RawRecord::new(Some("1"), "5958143.125", "7466893.135", Some("10.125"))];
    let cfg = ClassifyCfg {
        round_input: Some(2),
        ..ClassifyCfg::default()
    };
    let c = classify(&records, Origin::Input, &cfg).unwrap();
    assert_eq!(c.points[0].x_raw, 5_958_143.12);
    assert_eq!(c.points[0].h, Some(10.12));
}

#[test]
fn boundary_vertices_are_easting_northing() {
    let records = vec![
        rec("5958100.00", "7466800.00"),
        rec("5958200.00", "7466800.00"),
        rec("5958200.00", "7466900.00"),
    ];
    let b = classify_boundary(&records, &ClassifyCfg::default()).unwrap();
    assert_eq!(b.detection.zone, Zone::Z7);
    assert_eq!(b.vertices[1].x, 7_466_800.0);
    assert_eq!(b.vertices[1].y, 5_958_200.0);
}
