//! Synthetic products laid out by the bundled schemas: a dual-pol science
//! product with a snapshot list, a browse product and the zoned land/sea
//! auxiliary grid.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use smospro::core::grid::{GeoRect, GridIdSource, GridIdTransform, PixelRect, dgg};
use smospro::core::snapshot::SnapshotPosition;
use smospro::core::tile::TileProducer;
use smospro::types::{CancelFlag, PolMode};
use smospro::{
    Error, ExportParams, ExportTarget, GeoFilter, ProductHeader, Registries, RenderParams, Renderer,
    band_accessor, open_product, run_export_batch, snapshot_accessor,
};

const SCIENCE: &str = "SM_OPER_MIR_SCLD1C_TEST";
const BROWSE: &str = "SM_OPER_MIR_BWLD1C_TEST";
const LAND_SEA: &str = "SM_OPER_AUX_DGGLSM_TEST";

// Snapshot_Information after time and id: OBET, state vectors, quaternions,
// TEC, geomagnetic field, sun and accuracy fields
const SNAPSHOT_TAIL: usize = 145;
const SNAPSHOT_LEN: u64 = 161;
const LAND_SEA_POINT_LEN: usize = 17;
const ZONES: usize = 10;

// incidence angle in units of 90 / 2^16 degrees
const INCIDENCE_39_375: u16 = 28672;
const INCIDENCE_45: u16 = 32768;
const FLAG_X: u16 = 0;
const FLAG_Y: u16 = 1;

fn tempdir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn header(name: &str, file_type: &str, schema: &str, count: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Earth_Explorer_Header>
  <Fixed_Header>
    <File_Name>{name}</File_Name>
    <File_Type>{file_type}</File_Type>
    <Validity_Period>
      <Validity_Start>UTC=2000-01-03T00:00:00</Validity_Start>
      <Validity_Stop>UTC=2000-01-03T02:00:00</Validity_Stop>
    </Validity_Period>
  </Fixed_Header>
  <Variable_Header>
    <Datablock_Schema>{schema}</Datablock_Schema>
    <Grid_Point_Count>{count}</Grid_Point_Count>
  </Variable_Header>
</Earth_Explorer_Header>
"#
    )
}

fn write_product(dir: &Path, name: &str, hdr: String, dbl: Vec<u8>) -> PathBuf {
    let product = dir.join(name);
    std::fs::create_dir_all(&product).unwrap();
    std::fs::write(product.join(format!("{name}.HDR")), hdr).unwrap();
    std::fs::write(product.join(format!("{name}.DBL")), dbl).unwrap();
    product
}

/// Cell centre as stored in the product's f32 fields.
fn stored_location(seqnum: i32) -> (f64, f64) {
    let (lon, lat) = dgg::center(seqnum).unwrap();
    (f64::from(lon as f32), f64::from(lat as f32))
}

/// Grid point header shared by science and browse records.
fn point_head(out: &mut Vec<u8>, seqnum: i32, observations: usize) {
    let (lon, lat) = dgg::center(seqnum).unwrap();
    let raw = GridIdTransform::Zoned.to_raw(seqnum).unwrap() as u32;
    out.extend_from_slice(&raw.to_le_bytes());
    out.extend_from_slice(&(lat as f32).to_le_bytes());
    out.extend_from_slice(&(lon as f32).to_le_bytes());
    out.extend_from_slice(&120.0f32.to_le_bytes());
    out.push(0);
    out.push(observations as u8);
}

#[derive(Clone, Copy)]
struct ScienceObs {
    flags: u16,
    bt: f32,
    incidence: u16,
    snapshot: u32,
}

fn obs(flags: u16, bt: f32, incidence: u16, snapshot: u32) -> ScienceObs {
    ScienceObs {
        flags,
        bt,
        incidence,
        snapshot,
    }
}

struct Science {
    dir: TempDir,
    a: i32,
    b: i32,
}

impl Science {
    /// Snapshots 10 and 11 are listed; 12 is seen only in an observation.
    /// Cell `a` holds X and Y at two incidence angles, cell `b` X only.
    fn new() -> Self {
        let dir = tempdir();
        let a = dgg::seqnum(10.0, 45.0);
        let b = dgg::seqnum(-60.0, -20.0);

        let mut dbl = 2u32.to_le_bytes().to_vec();
        for (id, days, seconds, micros) in [(10u32, 2i32, 3600u32, 500_000u32), (11, 2, 3612, 0)] {
            dbl.extend_from_slice(&days.to_le_bytes());
            dbl.extend_from_slice(&seconds.to_le_bytes());
            dbl.extend_from_slice(&micros.to_le_bytes());
            dbl.extend_from_slice(&id.to_le_bytes());
            dbl.extend_from_slice(&[0u8; SNAPSHOT_TAIL]);
        }
        dbl.extend_from_slice(&2u32.to_le_bytes());
        let points = [
            (
                a,
                vec![
                    obs(FLAG_X, 200.0, INCIDENCE_39_375, 10),
                    obs(FLAG_Y, 180.0, INCIDENCE_39_375, 10),
                    obs(FLAG_X, 210.0, INCIDENCE_45, 11),
                    obs(FLAG_Y, 190.0, INCIDENCE_45, 11),
                ],
            ),
            (
                b,
                vec![
                    obs(FLAG_X, 250.0, INCIDENCE_39_375, 11),
                    obs(FLAG_X, 260.0, INCIDENCE_45, 12),
                ],
            ),
        ];
        for (seqnum, list) in &points {
            point_head(&mut dbl, *seqnum, list.len());
            for o in list {
                dbl.extend_from_slice(&o.flags.to_le_bytes());
                dbl.extend_from_slice(&o.bt.to_le_bytes());
                // accuracy, incidence, azimuth, Faraday and geometric angles
                for v in [0u16, o.incidence, 0, 0, 0] {
                    dbl.extend_from_slice(&v.to_le_bytes());
                }
                dbl.extend_from_slice(&o.snapshot.to_le_bytes());
                dbl.extend_from_slice(&[0u8; 4]);
            }
        }
        let hdr = header(SCIENCE, "MIR_SCLD1C", "DBL_SM_OPER_MIR_SCLD1C_0400", points.len());
        write_product(dir.path(), SCIENCE, hdr, dbl);
        Self { dir, a, b }
    }

    fn path(&self) -> PathBuf {
        self.dir.path().join(SCIENCE)
    }
}

/// Two-point least-squares fit evaluated at 42.5°.
fn at_reference(low: f64, high: f64) -> f64 {
    low + (high - low) * (42.5 - 39.375) / (45.0 - 39.375)
}

fn datetime(day: u32, h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, day)
        .unwrap()
        .and_hms_micro_opt(h, m, s, micro)
        .unwrap()
}

#[test]
fn science_snapshot_list_and_areas() {
    let fx = Science::new();
    let product = open_product(&fx.path(), &Registries::bundled().unwrap()).unwrap();
    let info = product.snapshot_info().unwrap();

    assert_eq!(info.snapshot_ids().iter().copied().collect::<Vec<_>>(), vec![10, 11, 12]);
    assert_eq!(info.ids_for(PolMode::X).iter().copied().collect::<Vec<_>>(), vec![10, 11, 12]);
    assert_eq!(info.ids_for(PolMode::Y).iter().copied().collect::<Vec<_>>(), vec![10, 11]);
    assert!(info.ids_for(PolMode::Xy).is_empty());
    assert_eq!((info.first_id(), info.last_id()), (Some(10), Some(12)));

    assert_eq!(info.position(10), Some(SnapshotPosition { index: 0, offset: 4 }));
    assert_eq!(
        info.position(11),
        Some(SnapshotPosition {
            index: 1,
            offset: 4 + SNAPSHOT_LEN,
        })
    );
    assert_eq!(info.position(12), None);

    let (lon_a, lat_a) = stored_location(fx.a);
    let (lon_b, lat_b) = stored_location(fx.b);
    let area10 = info.area(10).unwrap();
    assert_eq!(area10, GeoRect::around_point(lon_a, lat_a));
    assert!(!area10.contains_point(lon_b, lat_b));
    let area11 = info.area(11).unwrap();
    assert_eq!(
        area11,
        GeoRect::around_point(lon_a, lat_a).union(&GeoRect::around_point(lon_b, lat_b))
    );
    assert_eq!(info.area(12), Some(GeoRect::around_point(lon_b, lat_b)));
    assert_eq!(info.area(13), None);

    assert_eq!(product.snapshot_time(10).unwrap(), Some(datetime(3, 1, 0, 0, 500_000)));
    assert_eq!(product.snapshot_time(11).unwrap(), Some(datetime(3, 1, 0, 12, 0)));
    // seen in an observation but not listed
    assert_eq!(product.snapshot_time(12).unwrap(), None);

    let envelope = product.envelope().unwrap();
    assert!(envelope.len() >= 2);
    assert!(envelope.contains_point(lon_a, lat_a));
    assert!(envelope.contains_point(lon_b, lat_b));
    assert!(!envelope.contains_point(100.0, 0.0));
}

#[test]
fn science_bands_interpolate_and_rotate_at_zero_angle() {
    let fx = Science::new();
    let product = open_product(&fx.path(), &Registries::bundled().unwrap()).unwrap();

    let x = band_accessor(&product, "BT_Value_X").unwrap().get(fx.a, f64::NAN);
    let y = band_accessor(&product, "BT_Value_Y").unwrap().get(fx.a, f64::NAN);
    assert!((x - at_reference(200.0, 210.0)).abs() < 1e-9);
    assert!((y - at_reference(180.0, 190.0)).abs() < 1e-9);

    // Faraday and geometric angles are zero: H is X and V is Y
    let h = band_accessor(&product, "BT_Value_H").unwrap().get(fx.a, f64::NAN);
    let v = band_accessor(&product, "BT_Value_V").unwrap().get(fx.a, f64::NAN);
    assert!((h - x).abs() < 1e-9);
    assert!((v - y).abs() < 1e-9);

    // cell b has no Y observations, so nothing rotates there
    let x_b = band_accessor(&product, "BT_Value_X").unwrap().get(fx.b, f64::NAN);
    assert!((x_b - at_reference(250.0, 260.0)).abs() < 1e-9);
    assert!(band_accessor(&product, "BT_Value_Y").unwrap().get(fx.b, f64::NAN).is_nan());
    assert!(band_accessor(&product, "BT_Value_H").unwrap().get(fx.b, f64::NAN).is_nan());

    let lat = band_accessor(&product, "Grid_Point_Latitude").unwrap();
    assert_eq!(lat.get(fx.a, f64::NAN), stored_location(fx.a).1);
}

#[test]
fn science_values_per_snapshot() {
    let fx = Science::new();
    let product = open_product(&fx.path(), &Registries::bundled().unwrap()).unwrap();
    let value = |band: &str, id: u32, seqnum: i32| {
        snapshot_accessor(&product, band, id).unwrap().get(seqnum, -1.0)
    };

    assert_eq!(value("BT_Value_X", 10, fx.a), 200.0);
    assert_eq!(value("BT_Value_Y", 10, fx.a), 180.0);
    assert_eq!(value("BT_Value_X", 11, fx.a), 210.0);
    assert_eq!(value("BT_Value_Y", 11, fx.a), 190.0);
    assert_eq!(value("BT_Value_X", 11, fx.b), 250.0);
    assert_eq!(value("BT_Value_X", 12, fx.b), 260.0);
    assert_eq!(value("BT_Value_Y", 12, fx.b), -1.0);
    assert_eq!(value("BT_Value_X", 12, fx.a), -1.0);

    assert!(matches!(
        snapshot_accessor(&product, "BT_Value_H", 10),
        Err(Error::UnknownBand { .. })
    ));
}

#[test]
fn snapshot_tiles_stay_inside_the_snapshot_area() {
    let fx = Science::new();
    let product = open_product(&fx.path(), &Registries::bundled().unwrap()).unwrap();
    // pixel rows finer than the 0.02 degree height of a point area
    let renderer = Renderer::new(RenderParams {
        raster_width: 32768,
        ..RenderParams::default()
    })
    .unwrap();
    let geom = renderer.raster().geometry(0).unwrap();
    let around = |seqnum: i32| {
        let (lon, lat) = dgg::center(seqnum).unwrap();
        let x = ((lon + 180.0) / 360.0 * geom.width as f64) as usize;
        let y = ((90.0 - lat) / 180.0 * geom.height as f64) as usize;
        PixelRect::new(x - 4, y - 4, 9, 9)
    };

    let tile = renderer
        .snapshot_producer(&product, "BT_Value_X", 11, -1.0f32)
        .unwrap()
        .tile(&around(fx.a), 0)
        .unwrap();
    assert_eq!(tile[[4, 4]], 210.0);
    // corners lie outside the point area
    assert_eq!(tile[[0, 0]], -1.0);
    assert_eq!(tile[[8, 8]], -1.0);
    assert!(tile.iter().all(|v| *v == 210.0 || *v == -1.0));

    let tile = renderer
        .snapshot_producer(&product, "BT_Value_X", 11, -1.0f32)
        .unwrap()
        .tile(&around(fx.b), 0)
        .unwrap();
    assert_eq!(tile[[4, 4]], 250.0);

    // snapshot 10 never saw cell b
    let tile = renderer
        .snapshot_producer(&product, "BT_Value_X", 10, -1.0f32)
        .unwrap()
        .tile(&around(fx.b), 0)
        .unwrap();
    assert!(tile.iter().all(|v| *v == -1.0));

    assert!(matches!(
        renderer.snapshot_producer(&product, "BT_Value_X", 99, -1.0f32),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn science_subset_takes_validity_from_snapshot_times() {
    let fx = Science::new();
    let (lon, lat) = dgg::center(fx.a).unwrap();
    let out = fx.dir.path().join("subset");
    std::fs::create_dir_all(&out).unwrap();
    let report = run_export_batch(
        &[fx.path()],
        &GeoFilter::Point { lon, lat },
        &ExportTarget::Subset(out.clone()),
        &ExportParams::default(),
        &CancelFlag::new(),
    )
    .unwrap();
    assert_eq!((report.processed, report.errors), (1, 0));

    let header = ProductHeader::read(&out.join(format!("{SCIENCE}.HDR"))).unwrap();
    assert_eq!(header.grid_point_count, Some(1));
    assert_eq!(header.validity_start, Some(datetime(3, 1, 0, 0, 0)));
    assert_eq!(header.validity_stop, Some(datetime(3, 1, 0, 12, 0)));

    let subset = open_product(&out, &Registries::bundled().unwrap()).unwrap();
    assert_eq!(subset.grid_index().unwrap().len(), 1);
    // the snapshot list is copied unchanged
    let position = subset.snapshot_info().unwrap().position(11);
    assert_eq!(position.map(|p| p.offset), Some(4 + SNAPSHOT_LEN));

    let x = snapshot_accessor(&subset, "BT_Value_X", 11).unwrap();
    assert_eq!(x.get(fx.a, -1.0), 210.0);
    assert_eq!(x.get(fx.b, -1.0), -1.0);
}

fn browse_product(dir: &Path, seqnum: i32) -> PathBuf {
    let mut dbl = 1u32.to_le_bytes().to_vec();
    point_head(&mut dbl, seqnum, 2);
    for (flags, bt, accuracy) in [(FLAG_X, 201.5f32, 1024u16), (FLAG_Y, 175.25, 2048)] {
        dbl.extend_from_slice(&flags.to_le_bytes());
        dbl.extend_from_slice(&bt.to_le_bytes());
        // accuracy, azimuth and footprint axes
        for v in [accuracy, 0, 0, 0] {
            dbl.extend_from_slice(&v.to_le_bytes());
        }
    }
    let hdr = header(BROWSE, "MIR_BWLD1C", "DBL_SM_OPER_MIR_BWLD1C_0400", 1);
    write_product(dir, BROWSE, hdr, dbl)
}

#[test]
fn browse_selects_one_observation_per_polarization() {
    let dir = tempdir();
    let seqnum = dgg::seqnum(30.0, 10.0);
    let path = browse_product(dir.path(), seqnum);
    let product = open_product(&path, &Registries::bundled().unwrap()).unwrap();

    assert_eq!(band_accessor(&product, "BT_Value_X").unwrap().get(seqnum, f64::NAN), 201.5);
    assert_eq!(band_accessor(&product, "BT_Value_Y").unwrap().get(seqnum, f64::NAN), 175.25);
    // raw counts times 0.000762939453125
    let accuracy = band_accessor(&product, "Radiometric_Accuracy_of_Pixel_Y").unwrap();
    assert_eq!(accuracy.get(seqnum, f64::NAN), 1.5625);
    assert!(band_accessor(&product, "BT_Value_X").unwrap().get(seqnum + 1, f64::NAN).is_nan());

    assert!(matches!(product.snapshot_info(), Err(Error::UnsupportedProduct { .. })));
    assert!(matches!(
        snapshot_accessor(&product, "BT_Value_X", 1),
        Err(Error::UnknownBand { .. })
    ));
    assert_eq!(product.snapshot_time(1).unwrap(), None);
}

struct LandSea {
    dir: TempDir,
    p: i32,
    q: i32,
}

impl LandSea {
    /// Ten zones; zone 0 holds land point `p`, zone 3 sea point `q`.
    fn new() -> Self {
        let dir = tempdir();
        let p = dgg::seqnum(5.0, 52.0);
        let q = dgg::seqnum(-70.0, -35.0);
        let mut dbl = Vec::new();
        for zone in 0..ZONES as u32 {
            let points: &[(i32, f32, u8)] = match zone {
                0 => &[(p, 12.5, 1)],
                3 => &[(q, 340.25, 0)],
                _ => &[],
            };
            dbl.extend_from_slice(&zone.to_le_bytes());
            dbl.extend_from_slice(&(points.len() as u32).to_le_bytes());
            for (seqnum, distance, mask) in points {
                let (lon, lat) = dgg::center(*seqnum).unwrap();
                let raw = GridIdTransform::Identity.to_raw(*seqnum).unwrap() as u32;
                dbl.extend_from_slice(&raw.to_le_bytes());
                dbl.extend_from_slice(&(lat as f32).to_le_bytes());
                dbl.extend_from_slice(&(lon as f32).to_le_bytes());
                dbl.extend_from_slice(&distance.to_le_bytes());
                dbl.push(*mask);
            }
        }
        let hdr = header(LAND_SEA, "AUX_DGGLSM", "DBL_SM_OPER_AUX_DGGLSM_0001", 2);
        write_product(dir.path(), LAND_SEA, hdr, dbl);
        Self { dir, p, q }
    }

    fn path(&self) -> PathBuf {
        self.dir.path().join(LAND_SEA)
    }
}

#[test]
fn zoned_index_spans_every_zone() {
    let fx = LandSea::new();
    let product = open_product(&fx.path(), &Registries::bundled().unwrap()).unwrap();
    assert_eq!(product.transform(), GridIdTransform::Identity);
    // 10 zone headers plus two points
    assert_eq!(product.data_len(), (ZONES * 8 + 2 * LAND_SEA_POINT_LEN) as u64);

    let index = product.grid_index().unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.seqnums(), &[fx.p, fx.q]);
    assert_eq!((index.record(fx.p), index.record(fx.q)), (Some(0), Some(1)));
    assert_eq!(index.record(fx.p + 1), None);

    let lists = index.lists();
    assert_eq!(lists.len(), ZONES);
    assert_eq!((lists[0].counter_offset, lists[0].list_offset, lists[0].list_end), (4, 8, 25));
    assert_eq!((lists[1].counter_offset, lists[1].list_offset, lists[1].list_end), (29, 33, 33));
    assert_eq!((lists[3].counter_offset, lists[3].list_offset, lists[3].list_end), (45, 49, 66));
    assert_eq!((lists[3].first_record, lists[3].record_count), (1, 1));
    assert_eq!(index.span(1).map(|s| (s.offset, s.len)), Some((49, LAND_SEA_POINT_LEN as u32)));

    let distance = band_accessor(&product, "Distance_To_Coast").unwrap();
    assert_eq!(distance.get(fx.p, f64::NAN), 12.5);
    assert_eq!(distance.get(fx.q, f64::NAN), 340.25);
    let mask = band_accessor(&product, "Land_Sea_Mask").unwrap();
    assert_eq!((mask.get(fx.p, -1.0), mask.get(fx.q, -1.0)), (1.0, 0.0));

    let envelope = product.envelope().unwrap();
    let (lon_p, lat_p) = stored_location(fx.p);
    let (lon_q, lat_q) = stored_location(fx.q);
    assert!(envelope.contains_point(lon_p, lat_p));
    assert!(envelope.contains_point(lon_q, lat_q));

    assert!(matches!(product.snapshot_info(), Err(Error::UnsupportedProduct { .. })));
}

#[test]
fn zoned_subset_patches_the_counter_of_each_zone() {
    let fx = LandSea::new();
    let (lon, lat) = dgg::center(fx.q).unwrap();
    let out = fx.dir.path().join("subset");
    std::fs::create_dir_all(&out).unwrap();
    let report = run_export_batch(
        &[fx.path()],
        &GeoFilter::Point { lon, lat },
        &ExportTarget::Subset(out.clone()),
        &ExportParams::default(),
        &CancelFlag::new(),
    )
    .unwrap();
    assert_eq!(report.processed, 1);

    let source = std::fs::read(fx.path().join(format!("{LAND_SEA}.DBL"))).unwrap();
    let subset = std::fs::read(out.join(format!("{LAND_SEA}.DBL"))).unwrap();
    assert_eq!(subset.len(), source.len() - LAND_SEA_POINT_LEN);
    // zone 0 keeps its id and loses its point
    assert_eq!(&subset[..4], &source[..4]);
    assert_eq!(&subset[4..8], &0u32.to_le_bytes());
    // zone 3 moved up by one point and still holds q
    assert_eq!(&subset[28..32], &1u32.to_le_bytes());
    assert_eq!(&subset[32..49], &source[49..66]);

    let product = open_product(&out, &Registries::bundled().unwrap()).unwrap();
    let index = product.grid_index().unwrap();
    assert_eq!(index.seqnums(), &[fx.q]);
    assert_eq!(index.lists().len(), ZONES);
    let distance = band_accessor(&product, "Distance_To_Coast").unwrap();
    assert_eq!(distance.get(fx.q, f64::NAN), 340.25);
    assert!(distance.get(fx.p, f64::NAN).is_nan());

    let header = ProductHeader::read(&out.join(format!("{LAND_SEA}.HDR"))).unwrap();
    assert_eq!(header.grid_point_count, Some(1));
    assert_eq!(header.file_name, LAND_SEA);
}
