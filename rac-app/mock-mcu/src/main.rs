use clap::Parser;
use core::convert::Infallible;
use embassy_executor::{Executor, Spawner};
use embassy_time::Timer;
use embedded_hal::digital::{ErrorType, OutputPin};
use rac_core::mk_static;
use rac_core::utils::{
    ActuationController, ControllerConfig, Dispatcher,
    connection::{
        CommandQueue, Consumer, Frame, Producer, SpiReceiver, UartReceiver,
        framing::{END_MARKER, START_MARKER},
    },
    controllers::{
        ActuatorOutputs, ActuatorTable, OutputError, PulseOutput, RawCommand, SharedActuators,
        actuators::ServoJoint,
        command::{CommandType, Direction, DirectionSpeed},
        outputs::DcMotorPins,
        shared,
    },
};
use static_cell::StaticCell;
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser)]
#[clap(version = "1.0", about = "Replay a command stream through the actuation core")]
struct Opts {
    /// File with the received bytes ("-" for stdin). A built-in demo stream
    /// is used when omitted.
    #[clap(long)]
    input: Option<PathBuf>,
    /// Input is whitespace-separated hex bytes instead of raw binary
    #[clap(long)]
    hex: bool,
    /// Input is a run of 8-byte pre-framed records (SPI) instead of a marker
    /// framed byte stream (UART)
    #[clap(long)]
    records: bool,
    /// Number of control ticks to run before exiting
    #[clap(long, default_value_t = 200)]
    ticks: u32,
    /// Control tick in milliseconds
    #[clap(long)]
    tick_ms: Option<u16>,
}

const FRAME_SLOTS: usize = 8;
const RECORD_SLOTS: usize = 16;

type FrameQueue = CommandQueue<Frame, FRAME_SLOTS>;
type RecordQueue = CommandQueue<RawCommand, RECORD_SLOTS>;

/// Bytes delivered per simulated receive interrupt.
const RX_CHUNK: usize = 16;

/// Direction enable that logs its level.
struct LogPin {
    name: &'static str,
    high: bool,
}

impl LogPin {
    fn new(name: &'static str) -> Self {
        LogPin { name, high: false }
    }

    fn set(
        &mut self,
        high: bool,
    ) {
        if self.high != high {
            debug!(pin = self.name, high, "pin");
        }
        self.high = high;
    }
}

impl ErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

/// PWM driver that logs every channel whose pulse width changes.
struct LogPwm {
    widths_us: [u32; 16],
}

impl PulseOutput for LogPwm {
    type Error = Infallible;

    fn set_pulse_width_us(
        &mut self,
        channel: u8,
        width_us: u32,
    ) -> Result<(), OutputError<Self::Error>> {
        let slot = self
            .widths_us
            .get_mut(channel as usize)
            .ok_or(OutputError::ChannelOutOfRange(channel))?;
        if *slot != width_us {
            info!(channel, width_us, "pwm");
            *slot = width_us;
        }
        Ok(())
    }
}

type Controller = ActuationController<'static, LogPin, LogPin, LogPwm>;

#[embassy_executor::task]
async fn rx_task(
    bytes: Vec<u8>,
    records: bool,
    record_tx: Producer<'static, RawCommand, RECORD_SLOTS>,
    frame_tx: Producer<'static, Frame, FRAME_SLOTS>,
) {
    if records {
        let mut spi = SpiReceiver::new(record_tx);
        for chunk in bytes.chunks_exact(8) {
            let mut transfer = [0u8; 8];
            transfer.copy_from_slice(chunk);
            spi.on_transfer(&transfer);
            Timer::after_millis(1).await;
        }
    } else {
        let mut uart = UartReceiver::new(frame_tx);
        for chunk in bytes.chunks(RX_CHUNK) {
            uart.on_bytes(chunk);
            Timer::after_millis(1).await;
        }
    }
    info!(len = bytes.len(), "input consumed");
}

#[embassy_executor::task]
async fn dispatch_task(
    dispatcher: Dispatcher<'static>,
    mut record_rx: Consumer<'static, RawCommand, RECORD_SLOTS>,
    mut frame_rx: Consumer<'static, Frame, FRAME_SLOTS>,
) -> ! {
    loop {
        let applied = dispatcher.poll(&mut record_rx, &mut frame_rx);
        if applied > 0 {
            debug!(applied, "commands applied");
        }
        Timer::after_millis(1).await;
    }
}

#[embassy_executor::task]
async fn motion_task(
    mut controller: Controller,
    actuators: &'static SharedActuators,
    ticks: u32,
) {
    if let Err(e) = controller.start() {
        error!("failed to centre servos: {:?}", e);
    }
    controller.run_for(ticks).await;

    actuators.lock(|table| {
        let table = table.borrow();
        for joint in ServoJoint::ALL {
            info!(?joint, degrees = table.servo(joint).current_degrees, "final position");
        }
    });
    info!(ticks, "done");
    std::process::exit(0);
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    opts: Opts,
) {
    let bytes = match load_input(&opts) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to read input: {}", e);
            std::process::exit(1);
        }
    };

    let config = ControllerConfig::new(opts.tick_ms, None);
    if let Err(e) = config.validate() {
        error!("invalid configuration: {:?}", e);
        std::process::exit(1);
    }
    let actuators: &'static SharedActuators =
        mk_static!(SharedActuators, shared(ActuatorTable::new(config)));

    let outputs = ActuatorOutputs::new(
        [
            DcMotorPins::new(LogPin::new("left_fwd"), LogPin::new("left_rev")),
            DcMotorPins::new(LogPin::new("right_fwd"), LogPin::new("right_rev")),
        ],
        LogPwm { widths_us: [0; 16] },
    );
    let controller = ActuationController::new(actuators, outputs);
    info!(tick_ms = controller.tick_ms(), ticks = opts.ticks, "starting");

    let (record_tx, record_rx) = mk_static!(RecordQueue, RecordQueue::new()).split();
    let (frame_tx, frame_rx) = mk_static!(FrameQueue, FrameQueue::new()).split();

    spawner
        .spawn(dispatch_task(Dispatcher::new(actuators), record_rx, frame_rx))
        .unwrap();
    spawner.spawn(motion_task(controller, actuators, opts.ticks)).unwrap();
    spawner
        .spawn(rx_task(bytes, opts.records, record_tx, frame_tx))
        .unwrap();
}

fn load_input(opts: &Opts) -> std::io::Result<Vec<u8>> {
    let Some(path) = &opts.input else {
        return Ok(demo_stream(opts.records));
    };
    let data = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut std::io::stdin(), &mut buf)?;
        buf
    } else {
        std::fs::read(path)?
    };
    if opts.hex {
        parse_hex(&data)
    } else {
        Ok(data)
    }
}

fn parse_hex(text: &[u8]) -> std::io::Result<Vec<u8>> {
    let text = String::from_utf8_lossy(text);
    text.split_whitespace()
        .map(|tok| {
            u8::from_str_radix(tok.trim_start_matches("0x"), 16).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{tok}: {e}"))
            })
        })
        .collect()
}

/// Drive forward, swing the base, park the elbow, then a JSON frame turning
/// in place.
fn demo_stream(records: bool) -> Vec<u8> {
    let commands = [
        RawCommand::motion(
            CommandType::LeftMotor,
            DirectionSpeed::new(Direction::Forward, 60, 300),
        ),
        RawCommand::motion(
            CommandType::RightMotor,
            DirectionSpeed::new(Direction::Forward, 60, 300),
        ),
        RawCommand::motion(
            CommandType::BaseMotor,
            DirectionSpeed::new(Direction::Forward, 100, 200),
        ),
        RawCommand::new(CommandType::ElbowPosition, [0x00, 0x5A, 50, 0, 0, 0, 0]),
    ];
    if records {
        return commands.iter().flat_map(|c| c.to_bytes()).collect();
    }

    let mut stream = Vec::new();
    stream.extend_from_slice(&START_MARKER);
    for c in &commands {
        stream.extend_from_slice(&c.to_bytes());
    }
    stream.extend_from_slice(&END_MARKER);
    // line noise between frames
    stream.extend_from_slice(&[0x00, 0x13, 0xAA]);
    stream.extend_from_slice(&START_MARKER);
    stream.extend_from_slice(
        br#"{"lw":{"d":-1,"s":40,"t":500},"rw":{"d":1,"s":40,"t":500},"smg":{"d":1,"s":55,"t":400}}"#,
    );
    stream.extend_from_slice(&END_MARKER);
    stream
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts: Opts = Opts::parse();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts)).unwrap();
    });
}
