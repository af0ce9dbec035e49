use clap::Parser;
use ds18b20::{Ds18b20, Resolution};
use ds2482::{Ds2482, Ds2482Builder, Variant};
use embedded_hal::delay::DelayNs;
use embedded_onewire::{OneWireSearch, OneWireSearchKind};
use fixed::types::I12F4;
use linux_embedded_hal::{Delay, I2cdev};

/// Maximum number of devices enumerated per channel
const MAX_DEVICES: usize = 32;

/// Read DS18B20 temperature sensors behind a DS2482 I2C to 1-Wire bridge
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to I2C bus (e.g., /dev/i2c-1)
    #[arg(short, long)]
    path: String,
    /// I2C address of the bridge (e.g., 0x18)
    #[arg(short, long, default_value = "0x18", value_parser = parse_address)]
    address: u8,
    /// Number of 1-Wire channels: 1 for the DS2482-100, 8 for the DS2482-800
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..=8))]
    channels: u8,
    /// Conversion resolution in bits
    #[arg(short, long, default_value_t = 12, value_parser = clap::value_parser!(u8).range(9..=12))]
    resolution: u8,
    /// Power the sensors through the strong pullup during conversions
    #[arg(long)]
    parasite: bool,
    /// Number of measurement rounds, forever if not given
    #[arg(short = 'n', long)]
    count: Option<u32>,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    match parsed {
        Ok(addr) if addr < 0x80 => Ok(addr),
        _ => Err(format!("{s} is not a 7-bit I2C address")),
    }
}

type Bridge = Ds2482<I2cdev, Delay>;

/// Sensors found on one bridge channel
struct Channel {
    index: u8,
    sensors: Vec<Ds18b20>,
}

fn discover(bridge: &mut Bridge, index: u8, resolution: Resolution) -> Option<Channel> {
    if let Err(e) = bridge.set_channel(index) {
        log::error!("Channel {index}: selection failed: {e:?}");
        return None;
    }
    let mut roms = [0u64; MAX_DEVICES];
    let found = match OneWireSearch::new(bridge, OneWireSearchKind::Normal).search_all(&mut roms) {
        Ok(found) => found,
        Err(e) => {
            log::error!("Channel {index}: search failed: {e:?}");
            return None;
        }
    };
    let mut sensors = Vec::new();
    for &rom in &roms[..found] {
        match Ds18b20::new::<()>(rom) {
            Ok(mut sensor) => {
                // Keep the alarm thresholds the sensor already holds
                let configured = sensor.read_scratchpad(bridge).and_then(|pad| {
                    sensor.set_resolution(bridge, pad.alarm_high(), pad.alarm_low(), resolution)
                });
                match configured {
                    Ok(()) => sensors.push(sensor),
                    Err(e) => log::error!("Channel {index}: {rom:016x}: not configured: {e:?}"),
                }
            }
            Err(e) => log::debug!("Channel {index}: skipping {rom:016x}: {e:?}"),
        }
    }
    log::info!("Channel {index}: {} DS18B20 of {found} devices", sensors.len());
    if sensors.is_empty() {
        None
    } else {
        Some(Channel { index, sensors })
    }
}

fn measure(bridge: &mut Bridge, delay: &mut Delay, channel: &mut Channel, args: &Args) {
    let index = channel.index;
    bridge.clear_errors();
    if let Err(e) = bridge.set_channel(index) {
        log::error!("Channel {index}: selection failed: {e:?}");
        return;
    }
    if let Err(e) = ds18b20::start_conversion_all(bridge, args.parasite) {
        log::error!("Channel {index}: conversion failed: {e:?}");
        return;
    }
    let wait = channel
        .sensors
        .iter()
        .map(|s| s.resolution().conversion_time_ms())
        .max()
        .unwrap_or_default();
    delay.delay_ms(wait);
    for sensor in channel.sensors.iter_mut() {
        let rom = sensor.rom();
        match sensor.read_scratchpad(bridge) {
            Ok(pad) => {
                let temp: I12F4 = pad.raw_temperature();
                log::info!("Channel {index}: {rom:016x}: {temp} °C");
            }
            Err(e) => log::error!("Channel {index}: {rom:016x}: read failed: {e:?}"),
        }
    }
    if let Err(e) = bridge.check_errors::<()>() {
        log::warn!("Channel {index}: bridge reported {e:?}");
    }
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    let resolution = Resolution::from_bits(args.resolution).unwrap_or_default();
    let variant = if args.channels > 1 {
        Variant::Octal
    } else {
        Variant::Single
    };
    // Open the I2C bus
    let i2c = I2cdev::new(&args.path).expect("Failed to open I2C device");
    let mut bridge = match Ds2482Builder::default()
        .with_address(args.address)
        .with_variant(variant)
        .build(i2c, Delay)
    {
        Ok(bridge) => bridge,
        Err(e) => {
            log::error!("No DS2482 at {:#04x}: {e:?}", args.address);
            std::process::exit(1);
        }
    };
    let mut delay = Delay;
    let mut channels: Vec<Channel> = (0..args.channels)
        .filter_map(|index| discover(&mut bridge, index, resolution))
        .collect();
    if channels.is_empty() {
        log::warn!("No DS18B20 found");
        return;
    }
    let mut round = 0;
    while args.count.is_none_or(|count| round < count) {
        for channel in channels.iter_mut() {
            measure(&mut bridge, &mut delay, channel, &args);
        }
        round += 1;
    }
}
