use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use std::{marker::PhantomData, path::Path};
use thiserror::Error;

use registers::*;

pub mod channel;
pub mod config;
pub mod rds;
pub mod registers;
pub mod scan;
pub mod session;
pub mod tuner;

/// 7-bit I2C slave address of the QN8035.
pub const QN8035_ADDRESS: u16 = 0x10;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I2C communication failed")]
    Bus(#[from] LinuxI2CError),
    #[error("Invalid value {1:#04X} in register {0:#04X}")]
    Decode(u8, u8),
    #[error("Invalid/unsupported chip ID {0:#04X}")]
    ChipId(u8),
    #[error("Frequency {0:.2}MHz is outside the tuning band")]
    OutOfBand(f64),
    #[error("Invalid config setting")]
    Invalid,
}

type Result<T> = std::result::Result<T, Error>;

/// Single-register transport. The receiver is driven entirely through 8-bit
/// register reads and writes on the two-wire bus; transactions are not
/// retried or verified.
pub trait Bus {
    fn read_reg(&mut self, addr: u8) -> Result<u8>;
    fn write_reg(&mut self, addr: u8, value: u8) -> Result<()>;
}

impl Bus for LinuxI2CDevice {
    fn read_reg(&mut self, addr: u8) -> Result<u8> {
        Ok(self.smbus_read_byte_data(addr)?)
    }

    fn write_reg(&mut self, addr: u8, value: u8) -> Result<()> {
        Ok(self.smbus_write_byte_data(addr, value)?)
    }
}

pub trait IO {
    type Port: Bus;
    fn bus(&mut self) -> &mut Self::Port;
    fn addr(&self) -> u8;
}

pub trait RX: IO {
    type Value: TryFrom<Reg8>;
    fn read(&mut self) -> Result<Self::Value> {
        let addr = self.addr();
        let raw = self.bus().read_reg(addr)?;
        Reg8(raw).try_into().map_err(|_| Error::Decode(addr, raw))
    }
}

pub trait TX: IO {
    type Value: Into<Reg8>;
    fn write(&mut self, value: Self::Value) -> Result<()> {
        let addr = self.addr();
        self.bus().write_reg(addr, value.into().0)
    }
}

pub struct ReadWrite<'a, B: Bus, V: TryFrom<Reg8> + Into<Reg8>> {
    data: PhantomData<V>,
    bus: &'a mut B,
    addr: u8,
}

impl<B: Bus, V: TryFrom<Reg8> + Into<Reg8>> IO for ReadWrite<'_, B, V> {
    type Port = B;
    fn bus(&mut self) -> &mut B {
        self.bus
    }
    fn addr(&self) -> u8 {
        self.addr
    }
}

impl<B: Bus, V: TryFrom<Reg8> + Into<Reg8>> RX for ReadWrite<'_, B, V> {
    type Value = V;
}

impl<B: Bus, V: TryFrom<Reg8> + Into<Reg8>> TX for ReadWrite<'_, B, V> {
    type Value = V;
}

pub struct ReadOnly<'a, B: Bus, V: TryFrom<Reg8>> {
    data: PhantomData<V>,
    bus: &'a mut B,
    addr: u8,
}

impl<B: Bus, V: TryFrom<Reg8>> IO for ReadOnly<'_, B, V> {
    type Port = B;
    fn bus(&mut self) -> &mut B {
        self.bus
    }
    fn addr(&self) -> u8 {
        self.addr
    }
}

impl<B: Bus, V: TryFrom<Reg8>> RX for ReadOnly<'_, B, V> {
    type Value = V;
}

pub struct WriteOnly<'a, B: Bus, V: Into<Reg8>> {
    data: PhantomData<V>,
    bus: &'a mut B,
    addr: u8,
}

impl<B: Bus, V: Into<Reg8>> IO for WriteOnly<'_, B, V> {
    type Port = B;
    fn bus(&mut self) -> &mut B {
        self.bus
    }
    fn addr(&self) -> u8 {
        self.addr
    }
}

impl<B: Bus, V: Into<Reg8>> TX for WriteOnly<'_, B, V> {
    type Value = V;
}

// Name: Type [Addr, Access],
macro_rules! registers {
    (
        $vis:vis struct $name:ident {
            $($reg:ident: $T:ty [ $addr:literal, $access:ident ],)*
        }
    ) => {

        #[allow(non_snake_case)]
        $vis struct $name<B: Bus> {
            bus: B,
        }

        #[allow(non_snake_case)]
        impl<B: Bus> $name<B> {
            $(
                pub fn $reg(&mut self) -> $access<'_, B, $T> {
                    $access {
                        data: PhantomData,
                        bus: &mut self.bus,
                        addr: $addr,
                    }
                }
            )*
        }
    }
}

/* Adapted from QN8035 Datasheet, register map */

registers! {
    pub struct Registers {
        /* Control & Status */
        SYSTEM1:      System1 [0x00, ReadWrite], // Device mode requests
        CCA:          u8      [0x01, ReadWrite], // Channel detection threshold
        SNR:          u8      [0x02, ReadOnly ], // Estimated SNR of the current channel
        RSSISIG:      u8      [0x03, ReadOnly ], // In-band signal strength
        STATUS1:      Status1 [0x04, ReadOnly ], // Receiver status
        CID1:         u8      [0x05, ReadOnly ], // Chip sub-family / revision
        CID2:         ChipId  [0x06, ReadOnly ], // Chip identity, checked once at startup
        /* Channel Selection */
        CH:           u8      [0x07, ReadWrite], // Channel word, low 8 bits
        CH_START:     u8      [0x08, ReadWrite], // Scan start word, low 8 bits
        CH_STOP:      u8      [0x09, ReadWrite], // Scan stop word, low 8 bits
        CH_STEP:      ChStep  [0x0A, ReadWrite], // Scan step + channel/start/stop high bits
        /* RDS Blocks A-D, high byte first */
        RDSD0:        u8      [0x0B, ReadOnly ],
        RDSD1:        u8      [0x0C, ReadOnly ],
        RDSD2:        u8      [0x0D, ReadOnly ],
        RDSD3:        u8      [0x0E, ReadOnly ],
        RDSD4:        u8      [0x0F, ReadOnly ],
        RDSD5:        u8      [0x10, ReadOnly ],
        RDSD6:        u8      [0x11, ReadOnly ],
        RDSD7:        u8      [0x12, ReadOnly ],
        /* Audio */
        VOL_CTL:      VolCtl  [0x14, ReadWrite], // Analog gain in the low 3 bits
        /* Scan Sensitivity */
        CCA_SNR_TH_1: u8      [0x39, ReadWrite], // Scan SNR threshold 1
        CCA_SNR_TH_2: u8      [0x3A, ReadWrite], // Scan SNR threshold 2
        NCCFIR3:      u8      [0x40, ReadWrite], // Scan noise filter coefficient
    }
}

/// Opens the I2C adapter with the receiver's slave address selected.
pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<LinuxI2CDevice, LinuxI2CError> {
    LinuxI2CDevice::new(path, QN8035_ADDRESS)
}

impl<B: Bus> Registers<B> {
    pub fn new(bus: B) -> Registers<B> {
        Registers { bus }
    }

    /// Verifies the chip identity. Anything other than a QN8035 is rejected
    /// up front; none of the other operations check again.
    pub fn probe(&mut self) -> Result<()> {
        let id = self.CID2().read()?;
        if id != ChipId::QN8035 {
            return Err(Error::ChipId(id.into()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mockbus {
    use super::*;

    const SYSTEM1: u8 = 0x00;

    /// Scripted in-memory register file standing in for the I2C adapter.
    pub struct MockBus {
        pub regs: [u8; 0x41],
        pub writes: Vec<(u8, u8)>,
        /// SYSTEM1 reads that still report a scan in progress; `None` keeps
        /// the in-progress bit set forever.
        pub scan_polls: Option<u32>,
    }

    impl MockBus {
        pub fn new() -> MockBus {
            MockBus {
                regs: [0; 0x41],
                writes: Vec::new(),
                scan_polls: Some(0),
            }
        }
    }

    impl Bus for MockBus {
        fn read_reg(&mut self, addr: u8) -> Result<u8> {
            let mut val = self.regs[usize::from(addr)];
            if addr == SYSTEM1 {
                match self.scan_polls {
                    None => val |= System1::CHSC.bits(),
                    Some(0) => val &= !System1::CHSC.bits(),
                    Some(ref mut n) => {
                        val |= System1::CHSC.bits();
                        *n -= 1;
                    }
                }
            }
            Ok(val)
        }

        fn write_reg(&mut self, addr: u8, value: u8) -> Result<()> {
            self.regs[usize::from(addr)] = value;
            self.writes.push((addr, value));
            Ok(())
        }
    }
}
