use std::fs::File;
use std::io::BufReader;

use aribts::demux::{DemuxError, Demuxer, Event};
use aribts::pid::PidTable;
use aribts::Pid;

#[derive(Default)]
struct Count {
    input: u64,
    units: u64,
    dropped: u64,
    scrambled: u64,
}

const HELP: &str = "\
パケットとセクションを数えるコマンド

USAGE:
  count [OPTIONS] [PATH]

FLAGS:
  -h, --help    このヘルプを表示する
  --no-crc      CRC32を検証しない

ARGS:
  <PATH>        パケットを数えるTSファイルのパス
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let no_crc = args.contains("--no-crc");
    let path: std::path::PathBuf = args.free_from_str()?;

    env_logger::init();

    let f = File::open(path)?;
    let f = BufReader::with_capacity(188 * 1024, f);

    let mut demuxer = Demuxer::with_options(aribts::demux::Options {
        verify_crc: !no_crc,
        ..aribts::demux::Options::DEFAULT
    });
    demuxer.track_all();

    let mut input = 0_u64;
    let mut transport_error = 0_u64;
    let mut format_error = 0_u64;
    let mut counts = PidTable::from_fn(|_| Count::default());

    let mut on_event = |event: Event, counts: &mut PidTable<Count>| match event {
        Event::Unit(unit) => counts[unit.pid].units += 1,
        Event::Error { pid, error } => match error {
            DemuxError::TransportError => transport_error += 1,
            DemuxError::Scrambled => counts[pid].scrambled += 1,
            DemuxError::Discontinuity => counts[pid].dropped += 1,
            _ => format_error += 1,
        },
    };

    for packet in aribts::Packet::iter(f) {
        let packet = packet?;
        input += 1;
        counts[packet.pid()].input += 1;

        demuxer.feed(&packet);
        while let Some(event) = demuxer.next_event() {
            on_event(event, &mut counts);
        }
    }
    demuxer.flush();
    while let Some(event) = demuxer.next_event() {
        on_event(event, &mut counts);
    }
    drop(on_event);

    let total = |f: fn(&Count) -> u64| counts.iter().map(f).sum::<u64>();
    println!("Input Packets   : {:9}", input);
    println!("Format Error    : {:9}", format_error);
    println!("Transport Error : {:9}", transport_error);
    println!("Dropped         : {:9}", total(|c| c.dropped));
    println!("Scrambled       : {:9}", total(|c| c.scrambled));
    println!();
    println!(" PID :     Input     Units   Dropped Scrambled");
    for (pid, count) in counts.iter().enumerate() {
        if count.input != 0 && pid != u16::from(Pid::NULL) as usize {
            println!(
                "{:04X} : {:9} {:9} {:9} {:9}",
                pid, count.input, count.units, count.dropped, count.scrambled,
            );
        }
    }

    Ok(())
}
