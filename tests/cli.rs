use assert_cmd::Command;

use std::fs;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("rctu-{}-{}", std::process::id(), name));
    p
}

/* 4:2:0 8 bit clip: a flat frame followed by a copy with a bright square */
fn write_clip(path: &PathBuf, width: usize, height: usize) {
    let mut data = format!("YUV4MPEG2 W{} H{} F25:1 Ip A1:1 C420jpeg\n", width, height).into_bytes();
    let chroma = (width / 2) * (height / 2);
    for frame in 0..2 {
        data.extend_from_slice(b"FRAME\n");
        for y in 0..height {
            for x in 0..width {
                let bright = frame == 1 && x >= 16 && x < 32 && y >= 16 && y < 32;
                data.push(if bright { 200 } else { 64 });
            }
        }
        data.extend(std::iter::repeat(128).take(2 * chroma));
    }
    fs::write(path, data).unwrap();
}

#[test]
fn summarizes_every_frame() {
    let input = temp_path("summary.y4m");
    write_clip(&input, 64, 64);

    let out = Command::cargo_bin("rctu")
        .unwrap()
        .args(&["-i", input.to_str().unwrap(), "--intra-period", "0", "--qp", "37"])
        .output()
        .unwrap();
    fs::remove_file(&input).unwrap();

    assert!(out.status.success());
    let report = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Frame 0 - I - ctus 1"));
    assert!(lines[1].starts_with("Frame 1 - P - ctus 1"));
    assert!(lines[2].starts_with("I:      1, P:      1"));
}

#[test]
fn writes_lossless_reconstruction() {
    let input = temp_path("lossless.y4m");
    let recon = temp_path("lossless-rec.y4m");
    write_clip(&input, 32, 32);

    Command::cargo_bin("rctu")
        .unwrap()
        .args(&[
            "-i",
            input.to_str().unwrap(),
            "-r",
            recon.to_str().unwrap(),
            "--max-cu-size",
            "32",
            "--max-depth",
            "2",
            "--lossless",
            "--frames",
            "1",
        ])
        .assert()
        .success();

    let org = fs::read(&input).unwrap();
    let rec = fs::read(&recon).unwrap();
    fs::remove_file(&input).unwrap();
    fs::remove_file(&recon).unwrap();

    // the first frame payload must come back unchanged
    let payload = |d: &[u8]| -> Vec<u8> {
        let start = d.windows(6).position(|w| w == b"FRAME\n").unwrap() + 6;
        d[start..start + 32 * 32 * 3 / 2].to_vec()
    };
    assert_eq!(payload(&org), payload(&rec));
}

#[test]
fn rejects_misaligned_picture() {
    let input = temp_path("odd.y4m");
    write_clip(&input, 36, 32);

    let out = Command::cargo_bin("rctu")
        .unwrap()
        .args(&["-i", input.to_str().unwrap()])
        .output()
        .unwrap();
    fs::remove_file(&input).unwrap();
    assert!(!out.status.success());
}
