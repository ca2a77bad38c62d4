use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripherals::Peripherals;

use std::time::Duration;

use ws281x_driver::rgb::{self, Rgb};
use ws281x_driver::transport::RmtTransport;
use ws281x_driver::config::ChannelOptions;
use ws281x_driver::{InitOptions, LedStrip, StripType};

const NUM_LEDS: usize = 16;
const WAIT: Duration = Duration::from_millis(50);
const CYCLES: usize = 10;

fn colour_wipe(strip: &mut LedStrip<RmtTransport<'_>>, colour: Rgb) -> anyhow::Result<()> {
    for i in 0..NUM_LEDS {
        strip.set_pixel(i, colour)?;
        strip.show()?;
        std::thread::sleep(WAIT);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    esp_idf_hal::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("Starting colorwipe {}", ws281x_driver::BUILD_INFO);

    let peripherals = Peripherals::take()?;

    // LED strip data on gpio0
    let pin = peripherals.pins.gpio0.downgrade_output();
    let channel = peripherals.rmt.channel0;
    let transport = RmtTransport::new(pin, channel)?;

    let options = InitOptions {
        channel: ChannelOptions {
            count: Some(NUM_LEDS),
            gpio_pin: Some(0),
            strip_type: Some(StripType::Grb),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut strip = LedStrip::new();
    strip.init(transport, &options)?;

    // Just so you don't get blind
    strip.set_brightness(5)?;

    for cycle in 0..CYCLES {
        log::info!(">> cycle {cycle}");
        colour_wipe(&mut strip, rgb::RED)?;
        colour_wipe(&mut strip, rgb::GREEN)?;
        colour_wipe(&mut strip, rgb::BLUE)?;
    }

    strip.reset()?;
    log::info!("Done");
    Ok(())
}
