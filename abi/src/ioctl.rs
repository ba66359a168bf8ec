//! Socket ioctl command numbers.
//!
//! The low byte selects the command; the high byte is the `'u'` group tag.

const GROUP: u32 = 0x75 << 8;

#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IoctlCode {
    Connect = GROUP | 0x01,
    Accept = GROUP | 0x02,
    Listen = GROUP | 0x03,
    SetType = GROUP | 0x04,
    Bind = GROUP | 0x05,
    GetSockName = GROUP | 0x06,
    GetPeerName = GROUP | 0x07,
    Shutdown = GROUP | 0x08,
    SocketPair = GROUP | 0x09,
    GetSoType = GROUP | 0x0a,
    GetPeerCred = GROUP | 0x0b,
    SetTarget = GROUP | 0x0c,
    GetFrom = GROUP | 0x0d,
    GetSndBuf = GROUP | 0x0e,
    SetSndBuf = GROUP | 0x0f,
    GetRcvBuf = GROUP | 0x10,
    SetRcvBuf = GROUP | 0x11,
    SendCtrl = GROUP | 0x12,
    RecvCtrl = GROUP | 0x13,
}

impl IoctlCode {
    const ALL: [Self; 19] = [
        Self::Connect,
        Self::Accept,
        Self::Listen,
        Self::SetType,
        Self::Bind,
        Self::GetSockName,
        Self::GetPeerName,
        Self::Shutdown,
        Self::SocketPair,
        Self::GetSoType,
        Self::GetPeerCred,
        Self::SetTarget,
        Self::GetFrom,
        Self::GetSndBuf,
        Self::SetSndBuf,
        Self::GetRcvBuf,
        Self::SetRcvBuf,
        Self::SendCtrl,
        Self::RecvCtrl,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_raw() == raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Commands whose in-flight state must be unwound on cancel.
    #[inline]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Connect | Self::Accept)
    }
}
