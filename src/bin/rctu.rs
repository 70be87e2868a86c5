mod common;
mod io;

use clap::{App, AppSettings, Arg, ArgMatches};

use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::str::FromStr;

use common::*;
use io::demuxer::{VideoInfo, Y4mDemuxer};
use io::muxer::Y4mMuxer;
use rctu::api::*;
use rctu::{CtuEncoder, Picture};

struct CLISettings {
    pub input: Y4mDemuxer,
    pub output: Box<dyn Write>,
    pub rec: Option<Y4mMuxer>,
    pub info: VideoInfo,
    pub enc: EncoderConfig,
    pub frames: usize,
    pub intra_period: usize,
    pub verbose: bool,
}

fn invalid_input<E: Display>(e: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
}

pub trait MatchGet {
    fn value_of_parsed<T: FromStr>(&self, name: &str) -> std::io::Result<Option<T>>
    where
        T::Err: Display;
}

impl MatchGet for ArgMatches<'_> {
    fn value_of_parsed<T: FromStr>(&self, name: &str) -> std::io::Result<Option<T>>
    where
        T::Err: Display,
    {
        match self.value_of(name) {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|e: T::Err| invalid_input(format!("{}: {}", name, e))),
            None => Ok(None),
        }
    }
}

fn parse_config(matches: &ArgMatches<'_>, info: &VideoInfo) -> std::io::Result<EncoderConfig> {
    let mut cfg = EncoderConfig::default();

    cfg.width = info.width;
    cfg.height = info.height;
    cfg.chroma_sampling = info.chroma_sampling;
    cfg.bit_depth_luma = info.bit_depth;
    cfg.bit_depth_chroma = info.bit_depth;
    cfg.rgb_format = matches.is_present("RGB");

    cfg.base_qp = matches.value_of_parsed("QP")?.unwrap_or(32);
    cfg.lambda = matches.value_of_parsed("LAMBDA")?.unwrap_or(0.0);
    cfg.max_cu_size = matches.value_of_parsed("MAX_CU_SIZE")?.unwrap_or(64);
    cfg.max_depth = matches.value_of_parsed("MAX_DEPTH")?.unwrap_or(3);
    if let Some(delta) = matches.value_of_parsed("MAX_DELTA_QP")? {
        cfg.use_dqp = true;
        cfg.max_delta_qp = delta;
        cfg.max_cu_dqp_depth = matches.value_of_parsed("DQP_DEPTH")?.unwrap_or(0);
    }
    cfg.adaptive_qp = matches.is_present("ADAPTIVE_QP");
    cfg.use_dqp |= cfg.adaptive_qp;

    cfg.transquant_bypass = matches.is_present("LOSSLESS");
    cfg.force_transquant_bypass = matches.is_present("LOSSLESS");

    cfg.early_skip = matches.is_present("EARLY_SKIP");
    cfg.early_cu = matches.is_present("EARLY_CU");
    cfg.cbf_fast_mode = matches.is_present("CBF_FAST");
    cfg.hash_me = matches.is_present("HASH_ME");
    cfg.amp = !matches.is_present("NO_AMP");
    cfg.fast_search = match matches.value_of("FAST_SEARCH").unwrap_or("diamond") {
        "full" => FastSearch::Full,
        "selective" => FastSearch::Selective,
        _ => FastSearch::Diamond,
    };

    cfg.ibc = matches.is_present("IBC");
    cfg.palette = matches.is_present("PALETTE");
    cfg.colour_transform = matches.is_present("ACT");
    cfg.use_pcm = matches.is_present("PCM");

    cfg.slice_byte_budget = matches.value_of_parsed("SLICE_BYTES")?.unwrap_or(0);

    cfg.validate().map_err(invalid_input)?;
    Ok(cfg)
}

fn parse_cli() -> std::io::Result<CLISettings> {
    let mut app = App::new("rctu")
        .version(env!("CARGO_PKG_VERSION"))
        .about("CTU rate-distortion mode decision")
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(
            Arg::with_name("FULLHELP")
                .help("Prints more detailed help information")
                .long("fullhelp"),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("y4m file to search")
                .short("i")
                .long("input")
                .required_unless("FULLHELP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("file name of the per frame report")
                .short("o")
                .long("output")
                .takes_value(true)
                .default_value("-"),
        )
        .arg(
            Arg::with_name("RECON")
                .help("file name of reconstructed video (y4m)")
                .short("r")
                .long("recon")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FRAMES")
                .help("maximum number of frames to be searched")
                .short("f")
                .long("frames")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("INTRA_PERIOD")
                .help("intra frame period; other frames are P frames predicted from the previous one (0: first frame only)")
                .short("p")
                .long("intra-period")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("QP")
                .help("slice QP")
                .short("q")
                .long("qp")
                .takes_value(true)
                .default_value("32"),
        )
        .arg(
            Arg::with_name("LAMBDA")
                .help("fixed lambda (derived from the QP when absent)")
                .long("lambda")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MAX_CU_SIZE")
                .help("CTU size (8, 16, 32, 64)")
                .long("max-cu-size")
                .takes_value(true)
                .default_value("64"),
        )
        .arg(
            Arg::with_name("MAX_DEPTH")
                .help("maximum quadtree depth")
                .long("max-depth")
                .takes_value(true)
                .default_value("3"),
        )
        .arg(
            Arg::with_name("MAX_DELTA_QP")
                .help("enables delta QP with this window around the slice QP")
                .long("max-delta-qp")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("DQP_DEPTH")
                .help("depth of the delta QP quantization group")
                .long("dqp-depth")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ADAPTIVE_QP")
                .help("luma activity based QP offset per CU")
                .long("adaptive-qp"),
        )
        .arg(
            Arg::with_name("LOSSLESS")
                .help("transquant bypass on every CU")
                .long("lossless"),
        )
        .arg(Arg::with_name("EARLY_SKIP").help("early skip detection").long("early-skip"))
        .arg(Arg::with_name("EARLY_CU").help("no split below a skipped CU").long("early-cu"))
        .arg(Arg::with_name("CBF_FAST").help("CBF fast mode").long("cbf-fast"))
        .arg(Arg::with_name("HASH_ME").help("hash based 2Nx2N inter search").long("hash-me"))
        .arg(Arg::with_name("NO_AMP").help("disable asymmetric shapes").long("no-amp"))
        .arg(
            Arg::with_name("FAST_SEARCH")
                .help("motion search (full, diamond, selective)")
                .long("fast-search")
                .takes_value(true)
                .possible_values(&["full", "diamond", "selective"]),
        )
        .arg(Arg::with_name("IBC").help("intra block copy").long("ibc"))
        .arg(Arg::with_name("PALETTE").help("palette mode").long("palette"))
        .arg(Arg::with_name("ACT").help("adaptive colour transform").long("act"))
        .arg(Arg::with_name("RGB").help("input is RGB (GBR planes)").long("rgb"))
        .arg(Arg::with_name("PCM").help("PCM candidates").long("pcm"))
        .arg(
            Arg::with_name("SLICE_BYTES")
                .help("slice byte budget (0: off)")
                .long("slice-bytes")
                .takes_value(true),
        )
        // DEBUGGING
        .arg(
            Arg::with_name("VERBOSE")
                .help("Verbose logging; outputs info for every frame")
                .long("verbose")
                .short("v"),
        );

    let matches = app.clone().get_matches();

    if matches.is_present("FULLHELP") {
        app.print_long_help().map_err(invalid_input)?;
        std::process::exit(0);
    }

    let input = Y4mDemuxer::new(matches.value_of("INPUT").unwrap_or("-"))?;
    let info = input.info();
    let enc = parse_config(&matches, &info)?;

    let output: Box<dyn Write> = match matches.value_of("OUTPUT").unwrap_or("-") {
        "-" => Box::new(std::io::stdout()),
        f => Box::new(File::create(f)?),
    };
    let rec = match matches.value_of("RECON") {
        Some(recon) => Some(Y4mMuxer::new(recon)?),
        None => None,
    };

    Ok(CLISettings {
        input,
        output,
        rec,
        info,
        enc,
        frames: matches.value_of_parsed("FRAMES")?.unwrap_or(0),
        intra_period: matches.value_of_parsed("INTRA_PERIOD")?.unwrap_or(1),
        verbose: matches.is_present("VERBOSE"),
    })
}

fn main() -> std::io::Result<()> {
    let mut cli = parse_cli()?;

    let intra_cfg = EncoderConfig {
        slice_type: SliceType::SLICE_I,
        ..cli.enc
    };
    let inter_cfg = EncoderConfig {
        slice_type: SliceType::SLICE_P,
        ..cli.enc
    };
    let mut intra = CtuEncoder::new(intra_cfg).map_err(invalid_input)?;
    let mut inter = CtuEncoder::new(inter_cfg).map_err(invalid_input)?;

    let total = if cli.frames > 0 { Some(cli.frames) } else { None };
    let mut progress = ProgressInfo::new(total);
    let mut prev: Option<Frame> = None;
    let mut index = 0;
    while cli.frames == 0 || index < cli.frames {
        let org = match cli.input.read()? {
            Some(f) => f,
            None => break,
        };

        let key = cli.intra_period > 0 && index % cli.intra_period == 0;
        let (enc, mut pic) = match prev.take() {
            Some(reference) if !key => {
                let pic = Picture::new(&inter_cfg, org)
                    .and_then(|p| p.with_refs(vec![reference]))
                    .map_err(invalid_input)?;
                (&mut inter, pic)
            }
            _ => (&mut intra, Picture::new(&intra_cfg, org).map_err(invalid_input)?),
        };

        let decisions = enc.encode_picture(&mut pic).map_err(invalid_input)?;
        let summary = FrameSummary::new(
            index,
            enc.config().slice_type,
            &decisions,
            enc.stats(),
            enc.config().slice_lambda(),
        );
        writeln!(cli.output, "{}", summary)?;
        progress.add_frame(summary);
        if cli.verbose {
            eprintln!("{}", progress);
        }

        if let Some(rec) = cli.rec.as_mut() {
            rec.write(&pic.reco, cli.info.bit_depth, cli.info.frame_rate)?;
        }
        prev = Some(pic.reco);
        index += 1;
    }

    writeln!(cli.output, "{}", progress.print_summary())?;
    cli.output.flush()
}
