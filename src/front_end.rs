//! The web form that sets PWM frequency and duty, and the status page it serves.
//!
//! Parsing ([`HttpRequest`], [`FormSubmission`]) and rendering
//! ([`render_status_page`]) are plain functions over byte and string buffers.
//! On the device, [`FrontEnd`] owns the [`PwmOutput`](crate::pwm_output::PwmOutput)s,
//! runs each submission through [`resolve`](crate::pwm_resolve::resolve), applies
//! the result, and serves the page over TCP port [`HTTP_PORT`].
//!
//! Submissions are handled one at a time, to completion, so each output's registers
//! have a single writer.

use core::fmt::Write;
use core::str::FromStr;

use heapless::String;

use crate::pwm_output::{CHANNEL_BINDINGS, CHANNEL_COUNT};
use crate::pwm_resolve::{PwmChannelRequest, PwmResolution};
use crate::station::StationOutcome;
use crate::{Error, Result};

/// TCP port the form is served on.
pub const HTTP_PORT: u16 = 80;

/// Capacity of the rendered status page, in bytes.
pub const PAGE_CAPACITY: usize = 3072;

const DEFAULT_FREQUENCY_HZ: u32 = 1_000;
const DEFAULT_DUTY_PERCENT: u8 = 50;
const HEADER_END: &str = "\r\n\r\n";

/// HTTP method of a request the front end understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Method {
    /// Show the status page.
    Get,
    /// Apply a form submission, then show the status page.
    Post,
}

/// The parts of an HTTP/1.1 request the front end uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    /// Request method.
    pub method: Method,
    /// Request target, for example `/`.
    pub path: &'a str,
    /// Body after the blank line; empty for `GET`.
    pub body: &'a str,
}

impl<'a> HttpRequest<'a> {
    /// Parse a complete request (see [`request_is_complete`]).
    ///
    /// # Errors
    ///
    /// [`Error::FormField`] naming the part of the request that could not be read.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let text = core::str::from_utf8(bytes).map_err(|_| Error::FormField("request"))?;
        let (head, body) = text
            .split_once(HEADER_END)
            .ok_or(Error::FormField("request"))?;
        let request_line = head.lines().next().ok_or(Error::FormField("request"))?;
        let mut parts = request_line.split_ascii_whitespace();
        let method = match parts.next() {
            Some("GET") => Method::Get,
            Some("POST") => Method::Post,
            _ => return Err(Error::FormField("method")),
        };
        let path = parts.next().ok_or(Error::FormField("path"))?;
        let body = content_length(head).map_or(body, |length| body.get(..length).unwrap_or(body));
        Ok(Self { method, path, body })
    }
}

/// Whether `bytes` holds the full header block and as much body as `Content-Length` says.
#[must_use]
pub fn request_is_complete(bytes: &[u8]) -> bool {
    let Ok(text) = core::str::from_utf8(bytes) else {
        return false;
    };
    let Some((head, body)) = text.split_once(HEADER_END) else {
        return false;
    };
    content_length(head).is_none_or(|length| body.len() >= length)
}

/// Check a partly received request against the `capacity` of its receive buffer.
///
/// `Ok(true)` when complete, `Ok(false)` when more bytes are needed and there is
/// room for them.
///
/// # Errors
///
/// [`Error::RequestTooLarge`] if the buffer is full and the request still is not complete.
pub fn request_progress(received: &[u8], capacity: usize) -> Result<bool> {
    if request_is_complete(received) {
        Ok(true)
    } else if received.len() >= capacity {
        Err(Error::RequestTooLarge(capacity))
    } else {
        Ok(false)
    }
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Status of a response to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum HttpStatus {
    /// `200 OK`.
    Ok,
    /// `400 Bad Request`: the request or the submission was rejected.
    BadRequest,
    /// `413 Payload Too Large`: the request did not fit the receive buffer.
    PayloadTooLarge,
}

impl HttpStatus {
    /// The status a rejected request is answered with.
    #[must_use]
    pub const fn for_error(err: Error) -> Self {
        match err {
            Error::RequestTooLarge(_) => Self::PayloadTooLarge,
            _ => Self::BadRequest,
        }
    }

    /// The HTTP/1.1 status line, without the line ending.
    #[must_use]
    pub const fn status_line(self) -> &'static str {
        match self {
            Self::Ok => "HTTP/1.1 200 OK",
            Self::BadRequest => "HTTP/1.1 400 Bad Request",
            Self::PayloadTooLarge => "HTTP/1.1 413 Payload Too Large",
        }
    }
}

/// Render the response header for an HTML body of `content_length` bytes.
///
/// # Errors
///
/// [`Error::PageOverflow`] if the header does not fit in `N` bytes.
pub fn render_response_header<const N: usize>(
    status: HttpStatus,
    content_length: usize,
) -> Result<String<N>> {
    let mut header = String::<N>::new();
    write!(
        header,
        "{}\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {content_length}\r\nConnection: close\r\n\r\n",
        status.status_line()
    )?;
    Ok(header)
}

/// One `application/x-www-form-urlencoded` submission of the PWM form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct FormSubmission {
    /// Logical output, `0..CHANNEL_COUNT`.
    pub channel: usize,
    /// Requested frequency in hertz (not yet validated).
    pub frequency_hz: u32,
    /// Requested duty percentage (not yet validated).
    pub duty_percent: u8,
}

impl FormSubmission {
    /// Parse `channel=..&frequency=..&duty=..`, in any order.
    ///
    /// Range checks on frequency and duty are left to the resolver.
    ///
    /// # Errors
    ///
    /// [`Error::FormField`] naming the first field that is missing, not a decimal
    /// number, or (for `channel`) not an existing output.
    pub fn parse(body: &str) -> Result<Self> {
        let mut channel = None;
        let mut frequency_hz = None;
        let mut duty_percent = None;
        for pair in body.trim().split('&') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            match name {
                "channel" => channel = Some(parse_field::<usize>("channel", value)?),
                "frequency" => frequency_hz = Some(parse_field::<u32>("frequency", value)?),
                "duty" => duty_percent = Some(parse_field::<u8>("duty", value)?),
                _ => {}
            }
        }
        let channel = channel
            .filter(|&channel| channel < CHANNEL_COUNT)
            .ok_or(Error::FormField("channel"))?;
        Ok(Self {
            channel,
            frequency_hz: frequency_hz.ok_or(Error::FormField("frequency"))?,
            duty_percent: duty_percent.ok_or(Error::FormField("duty"))?,
        })
    }

    /// The resolver input for this submission on a counter clocked at `timer_clock_hz`.
    #[must_use]
    pub const fn request(&self, timer_clock_hz: u32) -> PwmChannelRequest {
        PwmChannelRequest::new(self.frequency_hz, self.duty_percent, timer_clock_hz)
    }
}

fn parse_field<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::FormField(name))
}

/// The setting last applied to one output, as shown on the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct ChannelStatus {
    /// What was asked for.
    pub request: PwmChannelRequest,
    /// What it resolved to.
    pub resolution: PwmResolution,
}

/// Render the status page and form into a buffer of `N` bytes.
///
/// `message` is shown above the channels, for example the error from the last
/// submission.
///
/// # Errors
///
/// [`Error::PageOverflow`] if the page does not fit in `N` bytes. The page is never
/// silently truncated.
pub fn render_status_page<const N: usize>(
    ssid: &str,
    outcome: StationOutcome,
    channels: &[Option<ChannelStatus>; CHANNEL_COUNT],
    message: Option<&str>,
) -> Result<String<N>> {
    let mut page = String::<N>::new();
    page.push_str(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>duty-station</title></head>\
         <body><h1>duty-station</h1><p>Network ",
    )
    .map_err(|()| Error::PageOverflow)?;
    write_escaped(&mut page, ssid)?;
    match outcome {
        StationOutcome::Connected(address) => write!(page, ": connected as {address}</p>")?,
        StationOutcome::Failed => page
            .push_str(": not connected</p>")
            .map_err(|()| Error::PageOverflow)?,
    }
    if let Some(message) = message {
        page.push_str("<p><strong>").map_err(|()| Error::PageOverflow)?;
        write_escaped(&mut page, message)?;
        page.push_str("</strong></p>").map_err(|()| Error::PageOverflow)?;
    }

    for (index, (binding, status)) in CHANNEL_BINDINGS.iter().zip(channels).enumerate() {
        write!(page, "<h2>Channel {index} (GPIO {})</h2>", binding.gpio)?;
        let (frequency_hz, duty_percent) = match status {
            Some(ChannelStatus {
                request,
                resolution,
            }) => {
                write!(
                    page,
                    "<p>{} Hz at {} %: {} bits, duty count {}</p>",
                    request.frequency_hz,
                    request.duty_percent,
                    resolution.resolution_bits(),
                    resolution.duty_count()
                )?;
                (request.frequency_hz, request.duty_percent)
            }
            None => {
                page.push_str("<p>off</p>").map_err(|()| Error::PageOverflow)?;
                (DEFAULT_FREQUENCY_HZ, DEFAULT_DUTY_PERCENT)
            }
        };
        write!(
            page,
            "<form method=\"post\" action=\"/\">\
             <input type=\"hidden\" name=\"channel\" value=\"{index}\">\
             <label>Frequency (Hz) <input name=\"frequency\" value=\"{frequency_hz}\"></label> \
             <label>Duty (%) <input name=\"duty\" value=\"{duty_percent}\"></label> \
             <button type=\"submit\">Apply</button></form>"
        )?;
    }
    page.push_str("</body></html>").map_err(|()| Error::PageOverflow)?;
    Ok(page)
}

fn write_escaped<const N: usize>(page: &mut String<N>, text: &str) -> Result<()> {
    for character in text.chars() {
        let pushed = match character {
            '<' => page.push_str("&lt;"),
            '>' => page.push_str("&gt;"),
            '&' => page.push_str("&amp;"),
            '"' => page.push_str("&quot;"),
            _ => page.push(character),
        };
        pushed.map_err(|()| Error::PageOverflow)?;
    }
    Ok(())
}

#[cfg(not(feature = "host"))]
pub use device::FrontEnd;

#[cfg(not(feature = "host"))]
mod device {
    use defmt::{info, warn};

    use super::{ChannelStatus, FormSubmission};
    use crate::Result;
    use crate::pwm_output::{CHANNEL_COUNT, PwmOutput};
    use crate::station::StationOutcome;

    /// A device abstraction that owns the PWM outputs and serves the form that drives them.
    ///
    /// # Example
    /// ```rust,ignore
    /// use duty_station::front_end::FrontEnd;
    /// use duty_station::pwm_output::{CHANNEL_BINDINGS, PwmOutput};
    /// use embassy_rp::pwm::{Config, Pwm};
    ///
    /// async fn example(
    ///     p: embassy_rp::Peripherals,
    ///     stack: embassy_net::Stack<'static>,
    ///     outcome: duty_station::station::StationOutcome,
    /// ) -> ! {
    ///     let outputs = [
    ///         PwmOutput::new(Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, Config::default()), CHANNEL_BINDINGS[0]),
    ///         PwmOutput::new(Pwm::new_output_a(p.PWM_SLICE1, p.PIN_18, Config::default()), CHANNEL_BINDINGS[1]),
    ///     ];
    ///     let mut front_end = FrontEnd::new(outputs, "my-network", outcome);
    ///     front_end.serve(stack).await
    /// }
    /// ```
    pub struct FrontEnd<'d> {
        pub(super) outputs: [PwmOutput<'d>; CHANNEL_COUNT],
        pub(super) status: [Option<ChannelStatus>; CHANNEL_COUNT],
        pub(super) ssid: &'static str,
        pub(super) outcome: StationOutcome,
    }

    impl<'d> FrontEnd<'d> {
        /// Take ownership of the outputs. Every output starts off.
        #[must_use]
        pub const fn new(
            outputs: [PwmOutput<'d>; CHANNEL_COUNT],
            ssid: &'static str,
            outcome: StationOutcome,
        ) -> Self {
            Self {
                outputs,
                status: [None; CHANNEL_COUNT],
                ssid,
                outcome,
            }
        }

        /// Resolve a submission against its output's timer clock and apply it.
        ///
        /// # Errors
        ///
        /// Resolver and planning errors; the output is left unchanged.
        pub fn submit(&mut self, submission: FormSubmission) -> Result<ChannelStatus> {
            let (output, status) = self
                .outputs
                .iter_mut()
                .zip(self.status.iter_mut())
                .nth(submission.channel)
                .ok_or(crate::Error::FormField("channel"))?;
            let request = submission.request(output.timer_clock_hz());
            let resolution = request.resolve().inspect_err(|err| {
                warn!("FrontEnd: rejected {}: {}", submission, err);
            })?;
            output.apply(request.frequency_hz, resolution)?;
            let applied = ChannelStatus {
                request,
                resolution,
            };
            *status = Some(applied);
            info!("FrontEnd: channel {} now {}", submission.channel, applied);
            Ok(applied)
        }

        /// Latest applied setting per output.
        #[must_use]
        pub const fn status(&self) -> &[Option<ChannelStatus>; CHANNEL_COUNT] {
            &self.status
        }
    }

    #[cfg(feature = "wifi")]
    mod serve {
        use core::fmt::Write;

        use defmt::{info, warn};
        use embassy_net::Stack;
        use embassy_net::tcp::TcpSocket;
        use embassy_time::Duration;
        use heapless::String;

        use super::FrontEnd;
        use crate::front_end::{
            FormSubmission, HTTP_PORT, HttpRequest, HttpStatus, Method, PAGE_CAPACITY,
            render_response_header, render_status_page, request_progress,
        };
        use crate::{Error, Result};

        const SOCKET_BUFFER_SIZE: usize = 1024;
        const REQUEST_BUFFER_SIZE: usize = 1024;
        const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

        impl FrontEnd<'_> {
            /// Serve the form on [`HTTP_PORT`], one connection at a time, forever.
            pub async fn serve(&mut self, stack: Stack<'static>) -> ! {
                let mut rx_buffer = [0_u8; SOCKET_BUFFER_SIZE];
                let mut tx_buffer = [0_u8; SOCKET_BUFFER_SIZE];
                let mut request_buffer = [0_u8; REQUEST_BUFFER_SIZE];
                info!("FrontEnd: listening on port {}", HTTP_PORT);
                loop {
                    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
                    socket.set_timeout(Some(SOCKET_TIMEOUT));
                    if let Err(err) = socket.accept(HTTP_PORT).await {
                        warn!("FrontEnd: accept error: {:?}", err);
                        continue;
                    }
                    if let Err(err) = self.handle_connection(&mut socket, &mut request_buffer).await {
                        warn!("FrontEnd: connection error: {}", err);
                    }
                    socket.close();
                    if socket.flush().await.is_err() {
                        socket.abort();
                    }
                }
            }

            async fn handle_connection(
                &mut self,
                socket: &mut TcpSocket<'_>,
                request_buffer: &mut [u8],
            ) -> Result<()> {
                let capacity = request_buffer.len();
                let mut filled = 0;
                let received = loop {
                    let received = request_buffer.get(..filled).unwrap_or_default();
                    match request_progress(received, capacity) {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(err) => break Err(err),
                    }
                    let free = request_buffer.get_mut(filled..).unwrap_or_default();
                    let read = socket.read(free).await.map_err(|_| Error::Network)?;
                    if read == 0 {
                        return Err(Error::Network);
                    }
                    filled = filled.saturating_add(read);
                };

                let mut message = String::<96>::new();
                let mut status = HttpStatus::Ok;
                let handled = received.and_then(|()| {
                    let request = HttpRequest::parse(request_buffer.get(..filled).unwrap_or_default())?;
                    if request.method == Method::Post {
                        let submission = FormSubmission::parse(request.body)?;
                        self.submit(submission)?;
                    }
                    Ok(())
                });
                if let Err(err) = handled {
                    warn!("FrontEnd: rejected request: {}", err);
                    write!(message, "{err}")?;
                    status = HttpStatus::for_error(err);
                }
                let page = render_status_page::<PAGE_CAPACITY>(
                    self.ssid,
                    self.outcome,
                    &self.status,
                    (!message.is_empty()).then_some(message.as_str()),
                )?;

                let header = render_response_header::<128>(status, page.len())?;
                write_all(socket, header.as_bytes()).await?;
                write_all(socket, page.as_bytes()).await
            }
        }

        async fn write_all(socket: &mut TcpSocket<'_>, mut bytes: &[u8]) -> Result<()> {
            while !bytes.is_empty() {
                let written = socket.write(bytes).await.map_err(|_| Error::Network)?;
                if written == 0 {
                    return Err(Error::Network);
                }
                bytes = bytes.get(written..).unwrap_or_default();
            }
            Ok(())
        }
    }
}
