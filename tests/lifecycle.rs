mod common;

use common::{channel, serial};
use ws281x_driver::transport::{LoopbackTransport, Transport, TransportError};
use ws281x_driver::{
    registry, DriverHandle, DriverState, Error, ErrorKind, InitOptions, LedStrip, StripConfig,
};

#[test]
fn initialize_then_reset_releases_everything() -> anyhow::Result<()> {
    let _serial = serial();
    for pixel_count in [1, 10, 300] {
        let mut transport = LoopbackTransport::new();
        let mut driver = DriverHandle::initialize(
            &mut transport,
            StripConfig::default(),
            channel(pixel_count),
            None,
        )?;
        driver.reset()?;
        drop(driver);
        assert!(!registry::is_claimed());
        assert!(!transport.is_open());

        // A second initialize must succeed
        let mut again = DriverHandle::initialize(
            &mut transport,
            StripConfig::default(),
            channel(pixel_count),
            None,
        )?;
        again.reset()?;
        drop(again);
        assert_eq!(transport.open_count(), 2);
    }
    Ok(())
}

#[test]
fn second_initialize_fails_without_touching_first() -> anyhow::Result<()> {
    let _serial = serial();
    let mut first = DriverHandle::initialize(
        LoopbackTransport::new(),
        StripConfig::default(),
        channel(2),
        None,
    )?;

    let mut second_transport = LoopbackTransport::new();
    let err = DriverHandle::initialize(
        &mut second_transport,
        StripConfig {
            dma_channel: 5,
            gpio_pin: 12,
            ..Default::default()
        },
        channel(2),
        None,
    )
    .err()
    .expect("second initialize must fail");
    assert_eq!(err.kind(), ErrorKind::HardwareAcquisition);
    assert!(matches!(
        err,
        Error::HardwareAcquisition(TransportError::InUse { dma_channel: 10 })
    ));
    assert_eq!(second_transport.open_count(), 0);

    // First handle still works
    assert_eq!(first.state(), DriverState::Ready);
    first.render(&[0xff; 8])?;
    assert_eq!(first.transport().frames().len(), 1);
    assert_eq!(registry::owner().map(|o| o.dma_channel), Some(10));
    first.reset()?;
    Ok(())
}

#[test]
fn render_before_initialize_is_rejected() {
    let _serial = serial();
    let mut strip: LedStrip<LoopbackTransport> = LedStrip::new();
    let err = strip.render(&[1, 2, 3, 4]).unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!registry::is_claimed());
}

#[test]
fn zero_count_is_rejected() {
    let _serial = serial();
    let mut transport = LoopbackTransport::new();
    let mut strip = LedStrip::new();
    let err = strip
        .init_json(&mut transport, r#"{"count": 0}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!strip.is_initialized());
    drop(strip);
    assert!(!registry::is_claimed());
    assert_eq!(transport.open_count(), 0);
}

#[test]
fn oversized_count_is_rejected() -> anyhow::Result<()> {
    let _serial = serial();
    let mut transport = LoopbackTransport::new();
    for options in [
        r#"{"count": 4611686018427387904}"#,
        r#"{"count": 1000000}"#,
        r#"{"count": 1, "channel1": {"count": 18446744073709551615}}"#,
    ] {
        let mut strip = LedStrip::new();
        let err = strip.init_json(&mut transport, options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config, "{options}");
        assert!(!strip.is_initialized());
        assert!(!registry::is_claimed());
    }
    assert_eq!(transport.open_count(), 0);

    // Nothing stays held, so a sane count goes through afterwards
    let mut strip = LedStrip::new();
    strip.init_json(&mut transport, r#"{"count": 8}"#)?;
    strip.reset()?;
    Ok(())
}

#[test]
fn reset_is_idempotent() -> anyhow::Result<()> {
    let _serial = serial();
    let mut driver = DriverHandle::initialize(
        LoopbackTransport::new(),
        StripConfig::default(),
        channel(3),
        None,
    )?;
    driver.reset()?;
    driver.reset()?;
    driver.reset()?;
    // Only the one blanking frame went out
    assert_eq!(driver.transport().frames().len(), 1);
    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert!(matches!(driver.set_brightness(1), Err(Error::NotInitialized)));
    assert!(matches!(driver.show(), Err(Error::NotInitialized)));
    Ok(())
}

#[test]
fn transmit_failure_keeps_driver_ready() -> anyhow::Result<()> {
    let _serial = serial();
    let mut driver = DriverHandle::initialize(
        LoopbackTransport::new(),
        StripConfig::default(),
        channel(2),
        None,
    )?;

    driver.transport_mut().fail_next_transmit(TransportError::Busy);
    let err = driver.render(&[0xff; 8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transmit);
    assert_eq!(driver.state(), DriverState::Ready);

    let after = driver.timeout();
    driver
        .transport_mut()
        .fail_next_wait(TransportError::Timeout { after });
    let err = driver.render(&[0xff; 8]).unwrap_err();
    assert!(matches!(
        err,
        Error::Transmit(TransportError::Timeout { .. })
    ));
    assert!(driver.is_ready());

    // A full re-render recovers
    driver.render(&[0x00; 8])?;
    assert_eq!(
        driver.transport().last_wire_bytes(0).unwrap()?,
        vec![0; 6]
    );
    Ok(())
}

#[test]
fn failed_blank_still_releases() -> anyhow::Result<()> {
    let _serial = serial();
    let mut transport = LoopbackTransport::new();
    let mut driver =
        DriverHandle::initialize(&mut transport, StripConfig::default(), channel(1), None)?;
    driver.transport_mut().fail_next_transmit(TransportError::Hardware {
        message: "dma error".to_string(),
    });
    let err = driver.reset().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transmit);
    assert_eq!(driver.state(), DriverState::Uninitialized);
    drop(driver);
    assert!(!registry::is_claimed());
    assert!(!transport.is_open());
    Ok(())
}

#[test]
fn acquisition_failure_is_retryable() -> anyhow::Result<()> {
    let _serial = serial();
    let mut transport = LoopbackTransport::new();
    let bad_pin = StripConfig {
        gpio_pin: 4,
        ..Default::default()
    };
    let err = DriverHandle::initialize(&mut transport, bad_pin, channel(4), None)
        .err()
        .expect("gpio 4 has no PWM");
    assert!(matches!(
        err,
        Error::HardwareAcquisition(TransportError::InvalidPin { pin: 4 })
    ));
    assert!(!registry::is_claimed());

    let bad_dma = StripConfig {
        dma_channel: 15,
        ..Default::default()
    };
    let err = DriverHandle::initialize(&mut transport, bad_dma, channel(4), None)
        .err()
        .expect("dma 15 does not exist");
    assert_eq!(err.kind(), ErrorKind::HardwareAcquisition);

    let mut driver =
        DriverHandle::initialize(&mut transport, StripConfig::default(), channel(4), None)?;
    driver.reset()?;
    Ok(())
}

#[test]
fn drop_resets_ready_driver() -> anyhow::Result<()> {
    let _serial = serial();
    let mut transport = LoopbackTransport::new();
    {
        let mut driver =
            DriverHandle::initialize(&mut transport, StripConfig::default(), channel(2), None)?;
        driver.render(&[0xff; 8])?;
    }
    assert!(!registry::is_claimed());
    assert!(!transport.is_open());
    assert_eq!(transport.frames().len(), 2);
    assert_eq!(transport.last_wire_bytes(0).unwrap()?, vec![0; 6]);
    Ok(())
}

#[test]
fn boxed_transport() -> anyhow::Result<()> {
    let _serial = serial();
    let transport: Box<dyn Transport> = Box::new(LoopbackTransport::new());
    let mut strip = LedStrip::new();
    strip.init(transport, &InitOptions::default())?;
    assert_eq!(strip.len(), 10);
    strip.show()?;
    strip.reset()?;
    assert!(!registry::is_claimed());
    Ok(())
}
