use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use rctu::api::*;
use rctu::{CtuEncoder, Picture};

criterion_group!(ctu, bench_ctu_intra, bench_ctu_inter);

fn new_frame(ra: &mut ChaChaRng, width: usize, height: usize) -> Frame {
    let mut f = Frame::new(width, height, ChromaSampling::Cs420);
    for plane in f.planes.iter_mut() {
        for pixel in plane.data.iter_mut() {
            let v: u8 = ra.gen();
            *pixel = v as i16;
        }
    }
    f
}

fn config(slice_type: SliceType) -> EncoderConfig {
    EncoderConfig {
        width: 64,
        height: 64,
        slice_type,
        base_qp: 32,
        ..Default::default()
    }
}

fn bench_ctu_intra(c: &mut Criterion) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let cfg = config(SliceType::SLICE_I);
    let org = new_frame(&mut ra, cfg.width, cfg.height);
    let mut enc = CtuEncoder::new(cfg).unwrap();
    let mut pic = Picture::new(&cfg, org).unwrap();

    c.bench_function("ctu_intra_64x64", |b| {
        b.iter(|| {
            enc.start_picture();
            let _ = black_box(enc.compress_ctu(&mut pic, 0, 0));
        })
    });
}

fn bench_ctu_inter(c: &mut Criterion) {
    let mut ra = ChaChaRng::from_seed([1; 32]);
    let cfg = EncoderConfig {
        early_skip: true,
        ..config(SliceType::SLICE_P)
    };
    let org = new_frame(&mut ra, cfg.width, cfg.height);
    let reference = new_frame(&mut ra, cfg.width, cfg.height);
    let mut enc = CtuEncoder::new(cfg).unwrap();
    let mut pic = Picture::new(&cfg, org).unwrap().with_refs(vec![reference]).unwrap();

    c.bench_function("ctu_inter_64x64", |b| {
        b.iter(|| {
            enc.start_picture();
            let _ = black_box(enc.compress_ctu(&mut pic, 0, 0));
        })
    });
}
