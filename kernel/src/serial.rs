//! Serial port driver for debug output
//!
//! 16550 UART on COM1 (0x3F8) via I/O ports. All kernel logging goes
//! through here; the console is write-only.

use core::fmt;
use spin::Mutex;
use x86_64::instructions::port::Port;

/// COM1 base port
const COM1: u16 = 0x3F8;

/// Global serial lock (prevents interleaved output)
static SERIAL_LOCK: Mutex<()> = Mutex::new(());

/// Initialize COM1: 115200 baud, 8N1, FIFO on
pub fn init() {
    unsafe {
        Port::<u8>::new(COM1 + 1).write(0x00u8); // Disable UART interrupts
        Port::<u8>::new(COM1 + 3).write(0x80u8); // Enable DLAB (set baud rate divisor)
        Port::<u8>::new(COM1 + 0).write(0x01u8); // Divisor lo byte (115200 baud)
        Port::<u8>::new(COM1 + 1).write(0x00u8); // Divisor hi byte
        Port::<u8>::new(COM1 + 3).write(0x03u8); // 8 bits, no parity, one stop bit
        Port::<u8>::new(COM1 + 2).write(0xC7u8); // Enable FIFO, clear, 14-byte threshold
        Port::<u8>::new(COM1 + 4).write(0x0Bu8); // IRQs enabled, RTS/DSR set
    }
}

/// Write a single byte, waiting for the transmit buffer to drain
fn write_byte(byte: u8) {
    let mut line_status = Port::<u8>::new(COM1 + 5);
    let mut data = Port::<u8>::new(COM1);
    unsafe {
        while line_status.read() & 0x20 == 0 {
            core::hint::spin_loop();
        }
        data.write(byte);
    }
}

fn write_bytes(bytes: &[u8]) {
    for &b in bytes {
        if b == b'\n' {
            write_byte(b'\r');
        }
        write_byte(b);
    }
}

struct SerialWriter;

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_bytes(s.as_bytes());
        Ok(())
    }
}

/// Print to serial port (internal use)
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;

    // Mask interrupts while holding the writer lock so a handler that logs
    // cannot deadlock against an interrupted writer.
    crate::interrupts::without_interrupts(|| {
        let _guard = SERIAL_LOCK.lock();
        let _ = SerialWriter.write_fmt(args);
    });
}

/// Print to serial port
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

/// Print to serial port with newline
#[macro_export]
macro_rules! serial_println {
    () => { $crate::serial_print!("\n") };
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}
