//! Spatial fusion (spec §4.6): neighbour correlation, composite risk, and
//! single-linkage cluster detection over a geographic grid.

use crate::geomath::haversine_m;
use crate::model::{Cluster, SensorAnalysis};

const CORRELATION_AGREEMENT_BAND: f64 = 0.2;

/// Sensors within `radius_m` of `origin`, excluding `origin` itself.
fn neighbours_within<'a>(
    origin: &SensorAnalysis,
    all: &'a [SensorAnalysis],
    radius_m: f64,
) -> Vec<&'a SensorAnalysis> {
    all.iter()
        .filter(|other| other.sensor_id != origin.sensor_id)
        .filter(|other| {
            haversine_m(
                origin.reading.latitude,
                origin.reading.longitude,
                other.reading.latitude,
                other.reading.longitude,
            ) <= radius_m
        })
        .collect()
}

/// Computes spatial correlation for each analysis in place and derives
/// `composite_risk` and `neighbour_ids`. Takes `base_risk`-populated
/// analyses and returns the fused set (order preserved).
pub fn fuse(mut analyses: Vec<SensorAnalysis>, correlation_radius_m: f64) -> Vec<SensorAnalysis> {
    let snapshot = analyses.clone();

    for analysis in analyses.iter_mut() {
        let neighbours = neighbours_within(analysis, &snapshot, correlation_radius_m);
        let correlation = if neighbours.is_empty() {
            0.5
        } else {
            let agreeing = neighbours
                .iter()
                .filter(|n| (n.base_risk - analysis.base_risk).abs() <= CORRELATION_AGREEMENT_BAND)
                .count();
            agreeing as f64 / neighbours.len() as f64
        };

        let multiplier = if correlation > 0.6 {
            1.3
        } else if correlation < 0.3 {
            0.5
        } else {
            1.0
        };

        analysis.spatial_correlation = correlation;
        analysis.composite_risk = (analysis.base_risk * multiplier).clamp(0.0, 1.0);
        analysis.neighbour_ids = neighbours.iter().map(|n| n.sensor_id.clone()).collect();
    }

    analyses
}

/// Union-find over indices into `members`, merging any pair within
/// `radius_m` of each other (single-linkage).
fn connected_components(members: &[&SensorAnalysis], radius_m: f64) -> Vec<Vec<usize>> {
    let n = members.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let d = haversine_m(
                members[i].reading.latitude,
                members[i].reading.longitude,
                members[j].reading.latitude,
                members[j].reading.longitude,
            );
            if d <= radius_m {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

/// Extracts clusters (spec §4.6) from fused analyses: sensors with
/// `composite_risk >= risk_threshold`, grouped by single-linkage within
/// `cluster_radius_m`, emitted when the component has `>= min_cluster_size`
/// members. Deterministic regardless of input ordering.
pub fn detect_clusters(
    analyses: &[SensorAnalysis],
    risk_threshold: f64,
    cluster_radius_m: f64,
    min_cluster_size: usize,
) -> Vec<Cluster> {
    let mut candidates: Vec<&SensorAnalysis> =
        analyses.iter().filter(|a| a.composite_risk >= risk_threshold).collect();
    // Sort by sensor_id first so cluster construction is independent of the
    // caller's input order (property 7).
    candidates.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));

    let components = connected_components(&candidates, cluster_radius_m);

    let mut clusters: Vec<Cluster> = components
        .into_iter()
        .filter(|group| group.len() >= min_cluster_size)
        .map(|group| {
            let mut members: Vec<&SensorAnalysis> = group.iter().map(|&i| candidates[i]).collect();
            members.sort_by(|a, b| b.composite_risk.partial_cmp(&a.composite_risk).unwrap());

            let n = members.len() as f64;
            let centroid_lat = members.iter().map(|m| m.reading.latitude).sum::<f64>() / n;
            let centroid_lon = members.iter().map(|m| m.reading.longitude).sum::<f64>() / n;
            let avg_composite_risk = members.iter().map(|m| m.composite_risk).sum::<f64>() / n;
            let max_composite_risk =
                members.iter().map(|m| m.composite_risk).fold(f64::MIN, f64::max);

            Cluster {
                member_ids: members.iter().map(|m| m.sensor_id.clone()).collect(),
                centroid_lat,
                centroid_lon,
                avg_composite_risk,
                max_composite_risk,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        a.member_ids
            .first()
            .cloned()
            .unwrap_or_default()
            .cmp(&b.member_ids.first().cloned().unwrap_or_default())
    });
    clusters
}
