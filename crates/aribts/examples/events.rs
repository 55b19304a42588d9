use std::fs::File;
use std::io::BufReader;

use aribts::desc::{DescriptorBlock, ShortEventDescriptor};
use aribts::eight::Options;
use aribts::psi::Section;
use aribts::scan::Scanner;
use aribts::time::{DateTime, TimeDate};
use aribts::Pid;

const HELP: &str = "\
EITから番組名を表示するコマンド

USAGE:
  events [OPTIONS] [PATH]

FLAGS:
  -h, --help    このヘルプを表示する
  --text        番組記述も表示する

ARGS:
  <PATH>        番組名を表示するTSファイルのパス
";

/// EITの各イベントを読み取って表示する。
fn print_events(section: &Section, with_text: bool) {
    let Some(syntax) = section.syntax() else {
        return;
    };
    // transport_stream_id〜last_table_idまでの6バイト
    let Some(mut data) = section.data().get(6..) else {
        log::debug!("invalid EIT");
        return;
    };

    while data.len() >= 12 {
        let event_id = u16::from_be_bytes([data[0], data[1]]);
        let start = <&[u8; 5]>::try_from(&data[2..7])
            .ok()
            .and_then(DateTime::read);
        let Some((descriptors, rem)) = DescriptorBlock::read(&data[10..]) else {
            log::debug!("invalid EIT::descriptors");
            return;
        };
        data = rem;

        let Some(short_event) = descriptors.get::<ShortEventDescriptor>() else {
            continue;
        };
        let name = match short_event.event_name.decode(Options::DEFAULT) {
            Ok(name) => name,
            Err(e) => {
                log::debug!("{:04X}: {}", event_id, e);
                continue;
            }
        };
        let start = start.map_or_else(|| "-".to_string(), |dt| dt.to_string());
        println!(
            "{:04X} {:04X} {} {}",
            syntax.table_id_extension, event_id, start, name
        );

        if with_text {
            if let Ok(text) = short_event.text.decode(Options::DEFAULT) {
                println!("\t{}", text);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let with_text = args.contains("--text");
    let path: std::path::PathBuf = args.free_from_str()?;

    env_logger::init();

    let f = File::open(path)?;
    let f = BufReader::with_capacity(188 * 1024, f);

    let mut scanner = Scanner::new(f);
    scanner.demuxer_mut().track(Pid::EIT);
    scanner.demuxer_mut().track(Pid::TDT);

    while let Some(unit) = scanner.next_unit()? {
        let Some(section) = unit.section() else {
            continue;
        };
        match section.table_id() {
            TimeDate::TDT_TABLE_ID | TimeDate::TOT_TABLE_ID => {
                if let Some(tdt) = TimeDate::read(&section) {
                    println!("# {}", tdt.jst_time);
                }
            }
            0x4E..=0x6F => print_events(&section, with_text),
            _ => {}
        }
    }

    Ok(())
}
