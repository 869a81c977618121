//! A simulated GPIO chip for exercising chips and requests without a device.
//!
//! Emulates the parts of the kernel the crate depends on: line ownership,
//! per-request value bitmaps, configuration and the event queues on chip and
//! request file descriptors.  Reads never block; an empty queue is `EAGAIN`.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    os::fd::RawFd,
    path::Path,
    rc::Rc,
    time::Duration,
};

use nix::errno::Errno;

use crate::{
    gateway::Gateway,
    line::encoder::{LineAttribute, LineRequestRecord},
    uapi::{self, v2},
};

const CHIP_NAME: &str = "gpiochip-sim";
const CHIP_LABEL: &str = "sim-gpio";

#[derive(Debug, Default)]
struct SimRequest {
    offsets: Vec<u32>,
    bits: u64,
}

#[derive(Debug, Default)]
struct SimState {
    names: Vec<String>,
    next_fd: RawFd,
    chips: HashSet<RawFd>,
    requests: HashMap<RawFd, SimRequest>,
    owners: HashMap<u32, (RawFd, String)>,
    flags: HashMap<u32, v2::LineFlags>,
    debounce: HashMap<u32, u32>,
    watched: HashSet<(RawFd, u32)>,
    queues: HashMap<RawFd, VecDeque<u8>>,
    deny_open: bool,
    deny_requests: bool,
    fail_close: bool,
    calls: usize,
    timestamp: u64,
    seqno: u32,
    last_request: Option<v2::gpio_line_request>,
    last_config: Option<v2::gpio_line_config>,
}

impl SimState {
    fn line_info(&self, offset: u32) -> nix::Result<v2::gpio_line_info> {
        let name = self.names.get(offset as usize).ok_or(Errno::EINVAL)?;
        let mut info = v2::gpio_line_info::zeroed();
        info.offset = offset;
        info.name[..name.len()].copy_from_slice(name.as_bytes());

        let mut flags = self.flags.get(&offset).copied().unwrap_or(v2::LineFlags::INPUT);
        if let Some((_, consumer)) = self.owners.get(&offset) {
            flags |= v2::LineFlags::USED;
            info.consumer[..consumer.len()].copy_from_slice(consumer.as_bytes());
        }
        info.flags = flags.pack();
        if let Some(us) = self.debounce.get(&offset) {
            info.num_attrs = 1;
            info.attrs[0] = LineAttribute::Debounce(*us).into_v2();
        }
        Ok(info)
    }

    fn notify(&mut self, offset: u32, change: v2::LineChangedType) {
        let Ok(info) = self.line_info(offset) else {
            return;
        };
        self.timestamp += 1;
        let mut event = v2::gpio_line_info_changed::zeroed();
        event.info = info;
        event.timestamp_ns = self.timestamp;
        event.event_type = change.bits();

        let watchers = self
            .watched
            .iter()
            .filter(|(_, line)| *line == offset)
            .map(|(fd, _)| *fd)
            .collect::<Vec<_>>();
        for fd in watchers {
            self.queues
                .entry(fd)
                .or_default()
                .extend(as_bytes(&event));
        }
    }

    fn alloc_fd(&mut self) -> RawFd {
        self.next_fd += 1;
        self.next_fd
    }

    /// Applies `record` to every line of the request as the kernel does:
    /// lines without a flags attribute get `default_flags`, lines without a
    /// debounce attribute lose their debounce, and outputs without a value
    /// are driven low.
    fn apply_config(&mut self, fd: RawFd, record: &LineRequestRecord, default_flags: v2::LineFlags) {
        let lines = record.lines();
        for line in lines.iter() {
            let (Some(resolved), Some(ord)) = (record.config_for(line), lines.ordinal(line)) else {
                continue;
            };
            let flags = resolved.flags.unwrap_or(default_flags);
            if flags.is_empty() {
                self.flags.remove(&line);
            } else {
                self.flags.insert(line, flags);
            }
            match resolved.debounce.map(|d| d.as_micros()) {
                Some(us) if us != 0 => self.debounce.insert(line, us),
                _ => self.debounce.remove(&line),
            };

            let value = match resolved.value {
                Some(value) => Some(value),
                None if flags.contains(v2::LineFlags::OUTPUT) => Some(false),
                None => None,
            };
            if let (Some(value), Some(req)) = (value, self.requests.get_mut(&fd)) {
                let bit = 1u64 << ord;
                req.bits = if value { req.bits | bit } else { req.bits & !bit };
            }
        }
    }
}

fn as_bytes<T: Copy>(raw: &T) -> Vec<u8> {
    // SAFETY: only used with the plain old data uAPI records
    unsafe {
        std::slice::from_raw_parts(raw as *const T as *const u8, std::mem::size_of::<T>())
    }
    .to_vec()
}

/// Handle on a simulated chip.  Clones share the same chip.
#[derive(Debug, Clone)]
pub(crate) struct SimGateway {
    state: Rc<RefCell<SimState>>,
}

impl SimGateway {
    /// A chip with `num_lines` lines named `line0`, `line1`, ...
    pub(crate) fn new(num_lines: u32) -> Self {
        let state = SimState {
            names: (0..num_lines).map(|n| format!("line{n}")).collect(),
            next_fd: 100,
            ..SimState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Number of uAPI calls issued so far.
    pub(crate) fn calls(&self) -> usize {
        self.state.borrow().calls
    }

    /// Number of descriptors, chip or request, currently open.
    pub(crate) fn open_fds(&self) -> usize {
        let state = self.state.borrow();
        state.chips.len() + state.requests.len()
    }

    pub(crate) fn deny_open(&self, deny: bool) {
        self.state.borrow_mut().deny_open = deny;
    }

    pub(crate) fn deny_requests(&self, deny: bool) {
        self.state.borrow_mut().deny_requests = deny;
    }

    /// Make `close` report `EIO` after closing the descriptor.
    pub(crate) fn fail_close(&self, fail: bool) {
        self.state.borrow_mut().fail_close = fail;
    }

    /// Hold `offset` on behalf of another process.
    pub(crate) fn claim(&self, offset: u32, consumer: &str) {
        self.state
            .borrow_mut()
            .owners
            .insert(offset, (-1, consumer.to_string()));
    }

    pub(crate) fn last_request(&self) -> Option<LineRequestRecord> {
        let req = self.state.borrow().last_request?;
        LineRequestRecord::from_v2(&req).ok()
    }

    pub(crate) fn last_config(&self) -> Option<v2::gpio_line_config> {
        self.state.borrow().last_config
    }

    /// The value the simulated kernel holds for a requested line.
    pub(crate) fn level(&self, offset: u32) -> Option<bool> {
        let state = self.state.borrow();
        let (fd, _) = state.owners.get(&offset)?;
        let req = state.requests.get(fd)?;
        let ord = req.offsets.iter().position(|o| *o == offset)?;
        Some(req.bits & (1 << ord) != 0)
    }

    /// Drive a requested line from outside, as an input would be.
    pub(crate) fn drive(&self, offset: u32, value: bool) {
        let mut state = self.state.borrow_mut();
        let Some((fd, _)) = state.owners.get(&offset).cloned() else {
            return;
        };
        if let Some(req) = state.requests.get_mut(&fd) {
            if let Some(ord) = req.offsets.iter().position(|o| *o == offset) {
                let bit = 1u64 << ord;
                req.bits = if value { req.bits | bit } else { req.bits & !bit };
            }
        }
    }

    /// Queue an edge event on the request holding `offset`.
    pub(crate) fn edge(&self, offset: u32, rising: bool) {
        let id = if rising {
            v2::LineEventId::RISING_EDGE
        } else {
            v2::LineEventId::FALLING_EDGE
        };
        self.event(offset, id.bits());
    }

    /// Queue an event record with an arbitrary `id` on the request holding
    /// `offset`.
    pub(crate) fn event(&self, offset: u32, id: u32) {
        let mut state = self.state.borrow_mut();
        let Some((fd, _)) = state.owners.get(&offset).cloned() else {
            return;
        };
        state.timestamp += 1;
        state.seqno += 1;
        let mut event = v2::gpio_line_event::zeroed();
        event.timestamp_ns = state.timestamp;
        event.id = id;
        event.offset = offset;
        event.seqno = state.seqno;
        event.line_seqno = state.seqno;
        state.queues.entry(fd).or_default().extend(as_bytes(&event));
    }

    /// Queue raw bytes on every open request, for malformed reads.
    pub(crate) fn garbage(&self, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        let fds = state.requests.keys().copied().collect::<Vec<_>>();
        for fd in fds {
            state.queues.entry(fd).or_default().extend(bytes);
        }
    }

    fn call(&self) -> std::cell::RefMut<'_, SimState> {
        let mut state = self.state.borrow_mut();
        state.calls += 1;
        state
    }
}

impl Gateway for SimGateway {
    fn open(&self, path: &Path) -> std::io::Result<RawFd> {
        let mut state = self.state.borrow_mut();
        if state.deny_open {
            return Err(std::io::ErrorKind::PermissionDenied.into());
        }
        if !path.to_string_lossy().contains("gpiochip") {
            return Err(std::io::ErrorKind::NotFound.into());
        }
        let fd = state.alloc_fd();
        state.chips.insert(fd);
        Ok(fd)
    }

    fn close(&self, fd: RawFd) -> nix::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.chips.remove(&fd) {
            state.watched.retain(|(w, _)| *w != fd);
            state.queues.remove(&fd);
        } else {
            let req = state.requests.remove(&fd).ok_or(Errno::EBADF)?;
            state.queues.remove(&fd);
            for offset in req.offsets {
                state.owners.remove(&offset);
                state.flags.remove(&offset);
                state.debounce.remove(&offset);
                state.notify(offset, v2::LineChangedType::RELEASED);
            }
        }
        if state.fail_close {
            return Err(Errno::EIO);
        }
        Ok(())
    }

    fn get_chip_info(&self, fd: RawFd, info: &mut uapi::gpio_chip_info) -> nix::Result<()> {
        let state = self.call();
        if !state.chips.contains(&fd) {
            return Err(Errno::EBADF);
        }
        *info = uapi::gpio_chip_info::zeroed();
        info.name[..CHIP_NAME.len()].copy_from_slice(CHIP_NAME.as_bytes());
        info.label[..CHIP_LABEL.len()].copy_from_slice(CHIP_LABEL.as_bytes());
        info.lines = state.names.len() as u32;
        Ok(())
    }

    fn get_line_info(&self, fd: RawFd, info: &mut v2::gpio_line_info) -> nix::Result<()> {
        let state = self.call();
        if !state.chips.contains(&fd) {
            return Err(Errno::EBADF);
        }
        *info = state.line_info(info.offset)?;
        Ok(())
    }

    fn watch_line_info(&self, fd: RawFd, info: &mut v2::gpio_line_info) -> nix::Result<()> {
        let mut state = self.call();
        if !state.chips.contains(&fd) {
            return Err(Errno::EBADF);
        }
        let offset = info.offset;
        *info = state.line_info(offset)?;
        if !state.watched.insert((fd, offset)) {
            return Err(Errno::EBUSY);
        }
        Ok(())
    }

    fn unwatch_line_info(&self, fd: RawFd, offset: u32) -> nix::Result<()> {
        let mut state = self.call();
        if offset as usize >= state.names.len() {
            return Err(Errno::EINVAL);
        }
        if !state.watched.remove(&(fd, offset)) {
            return Err(Errno::EBUSY);
        }
        Ok(())
    }

    fn get_line(&self, fd: RawFd, req: &mut v2::gpio_line_request) -> nix::Result<()> {
        let mut state = self.call();
        if !state.chips.contains(&fd) {
            return Err(Errno::EBADF);
        }
        if state.deny_requests {
            return Err(Errno::EACCES);
        }

        let num_lines = req.num_lines as usize;
        if num_lines == 0 || num_lines > v2::GPIO_LINES_MAX {
            return Err(Errno::EINVAL);
        }
        let offsets = req.offsets[..num_lines].to_vec();
        if offsets.iter().any(|o| *o as usize >= state.names.len()) {
            return Err(Errno::EINVAL);
        }
        let record = LineRequestRecord::from_v2(req).map_err(|_| Errno::EINVAL)?;
        if offsets.iter().any(|o| state.owners.contains_key(o)) {
            return Err(Errno::EBUSY);
        }

        let line_fd = state.alloc_fd();
        state.requests.insert(
            line_fd,
            SimRequest {
                offsets: offsets.clone(),
                bits: 0,
            },
        );
        for offset in &offsets {
            state
                .owners
                .insert(*offset, (line_fd, record.consumer().to_string()));
        }
        state.apply_config(line_fd, &record, v2::LineFlags::unpack(req.config.flags));
        for offset in offsets {
            state.notify(offset, v2::LineChangedType::REQUESTED);
        }

        req.fd = line_fd;
        state.last_request = Some(*req);
        Ok(())
    }

    fn set_line_config(&self, fd: RawFd, config: &mut v2::gpio_line_config) -> nix::Result<()> {
        let mut state = self.call();
        let offsets = state
            .requests
            .get(&fd)
            .map(|r| r.offsets.clone())
            .ok_or(Errno::EBADF)?;

        let mut req = v2::gpio_line_request::zeroed();
        req.num_lines = offsets.len() as u32;
        req.offsets[..offsets.len()].copy_from_slice(&offsets);
        req.config = *config;
        let record = LineRequestRecord::from_v2(&req).map_err(|_| Errno::EINVAL)?;

        state.apply_config(fd, &record, v2::LineFlags::unpack(config.flags));
        for offset in offsets {
            state.notify(offset, v2::LineChangedType::CONFIG);
        }
        state.last_config = Some(*config);
        Ok(())
    }

    fn get_line_values(&self, fd: RawFd, values: &mut v2::gpio_line_values) -> nix::Result<()> {
        let state = self.call();
        let req = state.requests.get(&fd).ok_or(Errno::EBADF)?;
        if values.mask == 0 {
            return Err(Errno::EINVAL);
        }
        values.bits = req.bits & values.mask;
        Ok(())
    }

    fn set_line_values(&self, fd: RawFd, values: &mut v2::gpio_line_values) -> nix::Result<()> {
        let mut state = self.call();
        let req = state.requests.get_mut(&fd).ok_or(Errno::EBADF)?;
        if values.mask == 0 {
            return Err(Errno::EINVAL);
        }
        req.bits = (req.bits & !values.mask) | (values.bits & values.mask);
        Ok(())
    }

    fn read(&self, fd: RawFd, buf: &mut [u8]) -> nix::Result<usize> {
        let mut state = self.state.borrow_mut();
        let queue = state.queues.get_mut(&fd).ok_or(Errno::EAGAIN)?;
        if queue.is_empty() {
            return Err(Errno::EAGAIN);
        }
        let n = buf.len().min(queue.len());
        for (wr, byte) in buf.iter_mut().zip(queue.drain(..n)) {
            *wr = byte;
        }
        Ok(n)
    }

    fn poll(&self, fd: RawFd, _timeout: Option<Duration>) -> nix::Result<bool> {
        let state = self.state.borrow();
        if !state.chips.contains(&fd) && !state.requests.contains_key(&fd) {
            return Err(Errno::EBADF);
        }
        Ok(state.queues.get(&fd).is_some_and(|q| !q.is_empty()))
    }
}
