// Copyright 2020-2024, Wayfair GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ingress socket setup. Every worker binds its own UDP socket with
//! `SO_REUSEPORT` so the kernel spreads datagrams across them, and the
//! receive buffer is pushed up to the kernel's ceiling so bursts from the
//! proxy survive a slow consumer.

use slog::Logger;
use std::fs;
use std::io;
use std::mem;
use std::net::UdpSocket;
use std::os::unix::io::FromRawFd;

/// Fallback when the kernel's ceiling cannot be read.
pub const MAX_UDP_RECV_BUFFER_SIZE: usize = 64 * 1024 * 1024;

const RMEM_MAX_PATH: &str = "/proc/sys/net/core/rmem_max";

fn rmem_max(logger: &Logger) -> usize {
    match fs::read_to_string(RMEM_MAX_PATH) {
        Ok(value) => match value.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                error!(logger, "failed to parse rmem_max: {}", e);
                MAX_UDP_RECV_BUFFER_SIZE
            }
        },
        Err(e) => {
            error!(logger, "failed to read rmem_max: {}", e);
            MAX_UDP_RECV_BUFFER_SIZE
        }
    }
}

/// The kernel doubles the value passed to `SO_RCVBUF` to cover its own
/// bookkeeping, and floors anything larger back to 2 x rmem_max. Asking
/// for double therefore lands the datagram portion exactly at rmem_max.
fn desired_recv_buf_size(rmem_max: usize) -> usize {
    rmem_max * 2
}

fn last_errno() -> io::Error {
    io::Error::last_os_error()
}

fn get_recv_buf_size(fd: i32) -> io::Result<usize> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let r = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &mut value as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if r < 0 {
        return Err(last_errno());
    }
    if value < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid UDP receive buffer size {}", value),
        ));
    }
    Ok(value as usize)
}

fn set_recv_buf_size(fd: i32, size: usize) -> io::Result<()> {
    let value = size.min(libc::c_int::MAX as usize) as libc::c_int;
    let r = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &value as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if r < 0 {
        return Err(last_errno());
    }
    Ok(())
}

fn set_reuse_port(fd: i32) -> io::Result<()> {
    let reuse: libc::c_int = 1;
    let r = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &reuse as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if r < 0 {
        return Err(last_errno());
    }
    Ok(())
}

/// Create the worker's ingress socket and return it together with the
/// size the userspace receive buffer must have so one `recv` always
/// holds one whole datagram.
pub fn create_socket(logger: &Logger, port: u16) -> io::Result<(UdpSocket, usize)> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, libc::IPPROTO_UDP) };
    if fd < 0 {
        return Err(last_errno());
    }
    // The fd owns itself from here; errors below close it on drop
    let socket = unsafe { UdpSocket::from_raw_fd(fd) };

    set_reuse_port(fd)?;

    let addr = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: port.to_be(),
        sin_addr: libc::in_addr {
            s_addr: libc::INADDR_ANY.to_be(),
        },
        sin_zero: [0; 8],
    };
    let r = unsafe {
        libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if r < 0 {
        return Err(last_errno());
    }

    let current = get_recv_buf_size(fd)?;
    let desired = desired_recv_buf_size(rmem_max(logger));
    if desired > current {
        set_recv_buf_size(fd, desired)?;
    }
    let actual = get_recv_buf_size(fd)?;

    info!(logger, "Default UDP recv buf size {} bytes", current);
    info!(logger, "Max UDP recv buf size {} bytes", desired);
    info!(logger, "New UDP recv buf size {} bytes", actual);

    Ok((socket, actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{o, Discard};

    #[test]
    fn desired_size_doubles_the_ceiling() {
        assert_eq!(desired_recv_buf_size(212_992), 425_984);
    }

    #[test]
    fn sockets_bind_with_port_reuse() {
        let logger = Logger::root(Discard, o!());
        // Port 0 picks a free port; two binds on the same port verify
        // SO_REUSEPORT took effect
        let (first, len) = create_socket(&logger, 0).unwrap();
        assert!(len > 0);
        let port = first.local_addr().unwrap().port();
        let (_second, _) = create_socket(&logger, port).unwrap();
    }
}
