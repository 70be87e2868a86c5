use criterion::*;

use rctu::api::*;
use rctu::enc::oracle::*;

criterion_group!(oracle, bench_lfcn_score);

fn bench_lfcn_score(c: &mut Criterion) {
    let lfcn = LfcnOracle::new(OracleConfig::default());
    let stats = CuStatistics {
        var_max: 0.42,
        depth_feature: 0.5,
        qp_feature: 0.37,
        has_residual: true,
        depth: 1,
        qp: 32,
        slice_type: SliceType::SLICE_P,
        content: ContentType::Geometry,
        occupancy: OccupancyClass::Boundary,
    };

    c.bench_function("lfcn_score", |b| {
        b.iter(|| {
            let _ = black_box(lfcn.vetoes_split(black_box(&stats)));
        })
    });
}
