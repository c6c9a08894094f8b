use super::Image;

/// Restartable walk over an image's samples: channel, then row, then column.
///
/// Call [`Image::values`] again to start over.
#[derive(Clone)]
pub struct Values<'a> {
    image: &'a Image,
    channels: Vec<usize>,
    channel: usize,
    x: usize,
    y: usize,
}

impl<'a> Values<'a> {
    pub(super) fn new(image: &'a Image, channels: Vec<usize>) -> Self {
        Self {
            image,
            channels,
            channel: 0,
            x: 0,
            y: 0,
        }
    }

    fn remaining(&self) -> usize {
        let plane = self.image.width() * self.image.height();
        if plane == 0 || self.channel >= self.channels.len() {
            return 0;
        }
        let done = self.y * self.image.width() + self.x;
        (self.channels.len() - self.channel) * plane - done
    }
}

impl Iterator for Values<'_> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.remaining() == 0 {
            return None;
        }
        let value = self
            .image
            .get_index(self.x, self.y, self.channels[self.channel]);

        self.x += 1;
        if self.x == self.image.width() {
            self.x = 0;
            self.y += 1;
            if self.y == self.image.height() {
                self.y = 0;
                self.channel += 1;
            }
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Values<'_> {}

/// Arithmetic mean; `NaN` for an empty sequence.
pub(super) fn mean(values: impl Iterator<Item = f32>) -> f64 {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation (Welford); `NaN` for an empty sequence.
pub(super) fn std_dev(values: impl Iterator<Item = f32>) -> f64 {
    let mut count = 0usize;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for v in values {
        count += 1;
        let v = v as f64;
        let delta = v - mean;
        mean += delta / count as f64;
        m2 += delta * (v - mean);
    }
    if count == 0 {
        f64::NAN
    } else {
        (m2 / count as f64).sqrt()
    }
}
